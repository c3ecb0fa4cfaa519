//! Quadrature rules of arbitrary strength for the reference triangle and tetrahedron.
//!
//! The rules are conical product (collapsed coordinate) rules: a tensor product of Gauss rules on
//! the unit cube is mapped onto the simplex by the Duffy transformation, and the Jacobian of
//! the transformation is absorbed into the weights. All weights are positive and all points are
//! strictly interior, which matters for cut elements where rules are applied to arbitrarily thin
//! sub-simplices.

use crate::univariate::gauss_unit_interval;
use crate::{Error, Rule1d, Rule2d, Rule3d};

/// The highest polynomial strength offered for simplices.
pub const MAX_STRENGTH: usize = 60;

/// Area of the reference triangle divided by the area of the unit triangle.
const TRIANGLE_SCALE: f64 = 4.0;

/// Volume of the reference tetrahedron divided by the volume of the unit tetrahedron.
const TETRAHEDRON_SCALE: f64 = 8.0;

fn check_strength(strength: usize) -> Result<(), Error> {
    if strength > MAX_STRENGTH {
        Err(Error::StrengthTooHigh {
            requested: strength,
            max: MAX_STRENGTH,
        })
    } else {
        Ok(())
    }
}

/// A rule for the reference triangle integrating polynomials of total degree `strength` exactly.
pub fn triangle(strength: usize) -> Result<Rule2d, Error> {
    check_strength(strength)?;
    // The Duffy Jacobian adds one degree in the collapsed direction
    let n = (strength + 3) / 2;
    let (w1d, p1d) = gauss_unit_interval(n);

    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (&wa, &[a]) in w1d.iter().zip(&p1d) {
        for (&wb, &[b]) in w1d.iter().zip(&p1d) {
            let u = a;
            let v = b * (1.0 - a);
            let jacobian = 1.0 - a;
            weights.push(TRIANGLE_SCALE * wa * wb * jacobian);
            points.push([2.0 * u - 1.0, 2.0 * v - 1.0]);
        }
    }
    Ok((weights, points))
}

/// A rule for the reference tetrahedron integrating polynomials of total degree `strength`
/// exactly.
pub fn tetrahedron(strength: usize) -> Result<Rule3d, Error> {
    check_strength(strength)?;
    // The Duffy Jacobian adds two degrees in the first collapsed direction
    let n = (strength + 4) / 2;
    let (w1d, p1d) = gauss_unit_interval(n);

    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (&wa, &[a]) in w1d.iter().zip(&p1d) {
        for (&wb, &[b]) in w1d.iter().zip(&p1d) {
            for (&wc, &[c]) in w1d.iter().zip(&p1d) {
                let u = a;
                let v = b * (1.0 - a);
                let w = c * (1.0 - a) * (1.0 - b);
                let jacobian = (1.0 - a) * (1.0 - a) * (1.0 - b);
                weights.push(TETRAHEDRON_SCALE * wa * wb * wc * jacobian);
                points.push([2.0 * u - 1.0, 2.0 * v - 1.0, 2.0 * w - 1.0]);
            }
        }
    }
    Ok((weights, points))
}

/// A rule for the reference segment [-1, 1] integrating polynomials of degree `strength` exactly.
pub fn segment(strength: usize) -> Result<Rule1d, Error> {
    check_strength(strength)?;
    Ok(crate::univariate::segment(strength))
}
