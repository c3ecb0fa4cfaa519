//! Quadrature rules for reference and cut elements.
//!
//! Reference rules come from `cutfem-quadrature` as `f64` data and are converted to the scalar
//! type in use. Cut elements need rules for sub-simplices of lower or equal dimension, which
//! are expressed in barycentric coordinates, see [`simplex::BarycentricRule`].
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, Scalar};

pub use crate::error::QuadratureError;

pub mod cache;
pub mod simplex;
pub mod subdivide;

pub type OwnedQuadratureParts<T, D, Data> = QuadratureParts<Vec<T>, Vec<OPoint<T, D>>, Vec<Data>>;

/// A quadrature rule stored as separate arrays of weights, points and per-point data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuadratureParts<WeightsArray, PointsArray, DataArray> {
    pub weights: WeightsArray,
    pub points: PointsArray,
    pub data: DataArray,
}

impl<T, D, Data> OwnedQuadratureParts<T, D, Data>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn empty() -> Self {
        Self {
            weights: Vec::new(),
            points: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn push(&mut self, weight: T, point: OPoint<T, D>, data: Data) {
        self.weights.push(weight);
        self.points.push(point);
        self.data.push(data);
    }

    /// Iterates over `(weight, point, data)` triplets.
    pub fn iter(&self) -> impl '_ + Iterator<Item = (&T, &OPoint<T, D>, &Data)> {
        self.weights
            .iter()
            .zip(&self.points)
            .zip(&self.data)
            .map(|((w, p), d)| (w, p, d))
    }
}
