
/// Computes `n!` as a floating point number.
pub fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}
