
use serde::{Deserialize, Serialize};

/// For serializing to JSON for subsequent analysis/plots
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub name: String,
    pub errors: Vec<f64>,
    /// Cell sizes of the uniform meshes.
    pub resolutions: Vec<f64>,
}

impl ErrorSummary {
    /// Observed convergence rate between the coarsest and the finest resolution.
    pub fn overall_rate(&self) -> f64 {
        let n = self.errors.len();
        let error_ratio = self.errors[0] / self.errors[n - 1];
        let h_ratio = self.resolutions[0] / self.resolutions[n - 1];
        error_ratio.ln() / h_ratio.ln()
    }

    pub fn print(&self) {
        println!("{}", serde_json::to_string_pretty(self).unwrap());
    }
}
