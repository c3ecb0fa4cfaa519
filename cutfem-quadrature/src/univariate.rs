//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::Rule;
use std::f64::consts::PI;

/// Tolerance for the Newton update when locating roots of Legendre polynomials.
const ROOT_TOLERANCE: f64 = 1e-15;

/// Newton iterations beyond this count are not expected for any practical number of points.
const MAX_NEWTON_ITERATIONS: usize = 100;

/// Value and derivative of the Legendre polynomial $P_n$ at a point in the open interval (-1, 1).
///
/// The derivative formula is singular at |x| == 1.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
    let mut p_current = 1.0;
    let mut p_previous = 0.0;
    for m in 1..=n {
        let m = m as f64;
        let p_next = ((2.0 * m - 1.0) * x * p_current - (m - 1.0) * p_previous) / m;
        p_previous = p_current;
        p_current = p_next;
    }
    let n = n as f64;
    let derivative = n * (x * p_current - p_previous) / (x * x - 1.0);
    (p_current, derivative)
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let num_unique = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Roots are symmetric about the origin, so we only locate the upper half
    for i in 0..num_unique {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p, dp) = legendre(n, x);
            let dx = -p / dp;
            x += dx;
            if dx.abs() <= ROOT_TOLERANCE {
                break;
            }
        }

        // Once a root is known, its weight is given explicitly by a standard formula
        let (_, dp) = legendre(n, x);
        points.push([x]);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    for i in num_unique..n {
        let mirror_idx = n - i - 1;
        points.push([-points[mirror_idx][0]]);
        weights.push(weights[mirror_idx]);
    }

    debug_assert_eq!(points.len(), n);
    (weights, points)
}

/// Gauss quadrature for the interval [0, 1].
///
/// The weights sum to one.
pub fn gauss_unit_interval(num_points: usize) -> Rule<1> {
    let (weights, points) = gauss(num_points);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| [0.5 * (x + 1.0)]).collect();
    (weights, points)
}

/// Gauss quadrature for [-1, 1] with the smallest number of points that integrates
/// polynomials of degree `strength` exactly.
pub fn segment(strength: usize) -> Rule<1> {
    gauss(strength / 2 + 1)
}
