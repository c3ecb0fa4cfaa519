use crate::mesh::MeshId;
use std::error::Error as StdError;
use std::fmt;
use std::fmt::{Display, Formatter};

pub use cutfem_quadrature::Error as QuadratureError;

/// Errors reported by `cutfem`.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A domain token other than `NEG`, `POS` or `IF`.
    InvalidDomainType(String),
    /// The level-set function could not be evaluated at the given vertex.
    LevelSetEvaluation { vertex: usize, source: eyre::Report },
    /// The level-set function could not be evaluated at a node of the given element.
    LevelSetEvaluationInElement { element: usize, source: eyre::Report },
    /// Derived data was computed on a different mesh than the one it is combined with.
    StaleData { expected: MeshId, found: MeshId },
    ElementOutOfBounds { index: usize, num_elements: usize },
    Quadrature(QuadratureError),
    DimensionMismatch { expected: usize, found: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDomainType(token) => {
                write!(f, "invalid domain type \"{}\" (expected NEG, POS or IF)", token)
            }
            Error::LevelSetEvaluation { vertex, source } => {
                write!(f, "failed to evaluate level set at vertex {}: {}", vertex, source)
            }
            Error::LevelSetEvaluationInElement { element, source } => {
                write!(f, "failed to evaluate level set in element {}: {}", element, source)
            }
            Error::StaleData { expected, found } => {
                write!(
                    f,
                    "stale data: computed on {} but used with {}. Recompute after changing the mesh",
                    found, expected
                )
            }
            Error::ElementOutOfBounds { index, num_elements } => {
                write!(f, "element index {} out of bounds for mesh with {} elements", index, num_elements)
            }
            Error::Quadrature(err) => write!(f, "quadrature error: {}", err),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::LevelSetEvaluation { source, .. } | Error::LevelSetEvaluationInElement { source, .. } => {
                Some(&**source)
            }
            Error::Quadrature(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuadratureError> for Error {
    fn from(err: QuadratureError) -> Self {
        Error::Quadrature(err)
    }
}

pub(crate) fn check_len(expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, found })
    }
}
