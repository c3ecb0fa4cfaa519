//! Quadrature rules for simplicial reference domains.
//!
//! The main purpose of this crate is to support the `cutfem` library, where every cut element
//! is decomposed into sub-simplices that each need a rule of a prescribed polynomial strength.
//! The rules are plain `f64` data and can be used independently of `cutfem`.
//!
//! Reference domains follow the convention
//!
//! - segment: $[-1, 1]$,
//! - triangle: the triangle with corners $(-1, -1)$, $(1, -1)$, $(-1, 1)$,
//! - tetrahedron: the tetrahedron with corners $(-1, -1, -1)$, $(1, -1, -1)$, $(-1, 1, -1)$,
//!   $(-1, -1, 1)$.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod univariate;

/// Errors raised when a requested rule cannot be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The requested polynomial strength exceeds the highest strength offered.
    StrengthTooHigh { requested: usize, max: usize },
    /// No rules are offered for simplices of the given dimension.
    UnsupportedDimension(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrengthTooHigh { requested, max } => {
                write!(f, "no rule of strength {requested} available (at most {max})")
            }
            Self::UnsupportedDimension(dim) => write!(f, "no rules for {dim}-dimensional simplices"),
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// A three-dimensional rule.
pub type Rule3d = Rule<3>;

/// Approximates the integral of `f` with the given rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, f: impl Fn(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, p)| w * f(p))
        .sum()
}
