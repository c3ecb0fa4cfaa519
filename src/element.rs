//! Geometry of linear simplex elements and their reference domain.
//!
//! The reference simplex has the vertices $(-1, \dots, -1)$ and $(-1, \dots, -1) + 2 e_i$, i.e.
//! the reference triangle has corners $(-1, -1)$, $(1, -1)$, $(-1, 1)$. Barycentric coordinates
//! are related to reference coordinates by $\lambda_i = (\xi_{i-1} + 1) / 2$ for $i \geq 1$ and
//! $\lambda_0 = 1 - \sum_{i \geq 1} \lambda_i$.
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};
use numeric_literals::replace_float_literals;

/// A map from the reference simplex to physical space.
pub trait ElementMap<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn map_reference_coords(&self, reference_coords: &OPoint<T, D>) -> OPoint<T, D>;

    /// The Jacobian $\partial x / \partial \xi$ of the map at the given reference coordinates.
    fn reference_jacobian(&self, reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D>;
}

/// A linear simplex in `D` dimensions, given by its `D + 1` vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexElement<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    vertices: Vec<OPoint<T, D>>,
}

impl<T, D> SimplexElement<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// # Panics
    ///
    /// Panics if the number of vertices is not `D + 1`.
    pub fn from_vertices(vertices: Vec<OPoint<T, D>>) -> Self {
        assert_eq!(vertices.len(), D::dim() + 1, "A simplex in D dimensions needs D + 1 vertices");
        Self { vertices }
    }

    pub fn reference() -> Self {
        Self::from_vertices(reference_vertices())
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    /// The (constant) Jacobian of the affine map from the reference simplex.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn jacobian(&self) -> OMatrix<T, D, D> {
        let v0 = &self.vertices[0];
        OMatrix::<T, D, D>::from_fn(|r, c| (self.vertices[c + 1][r] - v0[r]) * 0.5)
    }

    /// Physical measure (length, area or volume) of the element.
    pub fn measure(&self) -> T {
        self.jacobian().determinant().abs() * reference_measure::<T>(D::dim())
    }

    /// Length of the longest edge.
    pub fn diameter(&self) -> T {
        let mut diameter = T::zero();
        for (i, a) in self.vertices.iter().enumerate() {
            for b in &self.vertices[i + 1..] {
                diameter = diameter.max((b - a).norm());
            }
        }
        diameter
    }

    /// Gradient with respect to reference coordinates of the linear interpolant of nodal values.
    pub fn linear_reference_gradient(&self, values: &[T]) -> OVector<T, D> {
        linear_reference_gradient::<T, D>(values)
    }

    /// Physical gradient of the linear interpolant of nodal values.
    ///
    /// Returns `None` if the element is degenerate.
    pub fn linear_gradient(&self, values: &[T]) -> Option<OVector<T, D>> {
        let j_inv_t = self.jacobian().try_inverse()?.transpose();
        Some(j_inv_t * linear_reference_gradient::<T, D>(values))
    }
}

impl<T, D> ElementMap<T, D> for SimplexElement<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn map_reference_coords(&self, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let v0 = &self.vertices[0];
        let shifted = reference_coords.coords.add_scalar(T::one());
        v0 + self.jacobian() * shifted
    }

    fn reference_jacobian(&self, _reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D> {
        self.jacobian()
    }
}

/// Vertices of the reference simplex in `D` dimensions.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn reference_vertices<T, D>() -> Vec<OPoint<T, D>>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let origin = OPoint::from(OVector::<T, D>::repeat(-1.0));
    let mut vertices = vec![origin.clone()];
    for i in 0..D::dim() {
        let mut v = origin.clone();
        v[i] += 2.0;
        vertices.push(v);
    }
    vertices
}

/// Measure of the reference simplex of the given dimension, $2^d / d!$.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn reference_measure<T: Real>(dim: usize) -> T {
    (1..=dim).fold(T::one(), |acc, k| acc * 2.0 / T::from_usize(k).unwrap())
}

/// Barycentric coordinates (one per vertex) of a point given in reference coordinates.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn barycentric_from_reference<T, D>(reference_coords: &OPoint<T, D>, barycentric: &mut [T])
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(barycentric.len(), D::dim() + 1);
    let mut sum = T::zero();
    for i in 0..D::dim() {
        let lambda = (reference_coords[i] + 1.0) * 0.5;
        barycentric[i + 1] = lambda;
        sum += lambda;
    }
    barycentric[0] = 1.0 - sum;
}

/// Reference coordinates of a point given in barycentric coordinates.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn reference_from_barycentric<T, D>(barycentric: &[T]) -> OPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(barycentric.len(), D::dim() + 1);
    OPoint::from(OVector::<T, D>::from_fn(|i, _| 2.0 * barycentric[i + 1] - 1.0))
}

/// Gradient with respect to reference coordinates of the linear interpolant of vertex values.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn linear_reference_gradient<T, D>(values: &[T]) -> OVector<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    assert_eq!(values.len(), D::dim() + 1);
    OVector::<T, D>::from_fn(|i, _| (values[i + 1] - values[0]) * 0.5)
}

/// Evaluates the linear interpolant of vertex values at the given reference coordinates.
pub fn evaluate_linear<T, D>(values: &[T], reference_coords: &OPoint<T, D>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let gradient = linear_reference_gradient::<T, D>(values);
    let shifted = reference_coords.coords.add_scalar(T::one());
    values[0] + gradient.dot(&shifted)
}
