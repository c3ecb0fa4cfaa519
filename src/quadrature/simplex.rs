//! Quadrature rules for simplices of arbitrary intrinsic dimension, in barycentric form.
//!
//! A cut element is decomposed into sub-simplices: volume pieces with `D + 1` vertices and
//! interface facets with `D` vertices. A rule in barycentric coordinates can be mapped onto any
//! such simplex, regardless of the dimension of the surrounding space.
use crate::error::QuadratureError;
use crate::{Error, Real};
use nalgebra::allocator::Allocator;
use nalgebra::{convert, DMatrix, DefaultAllocator, DimName, OPoint, OVector};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A quadrature rule for the standard `m`-simplex in barycentric coordinates.
///
/// The weights sum to one, i.e. the rule integrates with respect to the normalized measure of
/// the simplex.
#[derive(Debug, Clone, PartialEq)]
pub struct BarycentricRule<T> {
    simplex_dim: usize,
    weights: Vec<T>,
    // `simplex_dim + 1` coordinates per point
    coordinates: Vec<T>,
}

impl<T: Real> BarycentricRule<T> {
    /// Constructs a rule of the given strength for the simplex of intrinsic dimension
    /// `simplex_dim` (0 for a point, up to 3 for a tetrahedron).
    pub fn new(simplex_dim: usize, strength: usize) -> Result<Self, Error> {
        // Reference rules use the [-1, 1]-based reference simplices, whose barycentric
        // coordinates are (x_i + 1) / 2 for i >= 1
        let (weights, points): (Vec<f64>, Vec<Vec<f64>>) = match simplex_dim {
            0 => (vec![1.0], vec![vec![]]),
            1 => {
                let (w, p) = cutfem_quadrature::simplex::segment(strength)?;
                (w, p.into_iter().map(|p| p.to_vec()).collect())
            }
            2 => {
                let (w, p) = cutfem_quadrature::simplex::triangle(strength)?;
                (w, p.into_iter().map(|p| p.to_vec()).collect())
            }
            3 => {
                let (w, p) = cutfem_quadrature::simplex::tetrahedron(strength)?;
                (w, p.into_iter().map(|p| p.to_vec()).collect())
            }
            _ => return Err(Error::Quadrature(QuadratureError::UnsupportedDimension(simplex_dim))),
        };

        let total: f64 = weights.iter().sum();
        let mut coordinates = Vec::with_capacity((simplex_dim + 1) * weights.len());
        for p in &points {
            let lambdas: Vec<f64> = p.iter().map(|x| 0.5 * (x + 1.0)).collect();
            coordinates.push(1.0 - lambdas.iter().sum::<f64>());
            coordinates.extend_from_slice(&lambdas);
        }

        Ok(Self {
            simplex_dim,
            weights: weights.into_iter().map(|w| convert(w / total)).collect(),
            coordinates: coordinates.into_iter().map(convert).collect(),
        })
    }

    pub fn simplex_dim(&self) -> usize {
        self.simplex_dim
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Barycentric coordinates of the `index`-th point.
    pub fn barycentric(&self, index: usize) -> &[T] {
        let n = self.simplex_dim + 1;
        &self.coordinates[n * index..n * (index + 1)]
    }

    /// Maps the rule onto the simplex with the given vertices and appends the resulting weights
    /// and points. Weights are scaled by `measure`.
    ///
    /// # Panics
    ///
    /// Panics if the number of vertices is not `simplex_dim + 1`.
    pub fn map_to_simplex<D>(
        &self,
        vertices: &[OPoint<T, D>],
        measure: T,
        weights: &mut Vec<T>,
        points: &mut Vec<OPoint<T, D>>,
    ) where
        D: DimName,
        DefaultAllocator: Allocator<T, D>,
    {
        assert_eq!(vertices.len(), self.simplex_dim + 1);
        for (q, &w) in self.weights.iter().enumerate() {
            let lambda = self.barycentric(q);
            let mut x = OVector::<T, D>::zeros();
            for (l, v) in lambda.iter().zip(vertices) {
                x += &v.coords * *l;
            }
            weights.push(w * measure);
            points.push(OPoint::from(x));
        }
    }
}

/// Measure of the simplex spanned by the given vertices, computed from the Gram determinant of
/// its edge vectors.
///
/// Works for simplices of any intrinsic dimension embedded in `D` dimensions, e.g. interface
/// segments in 2D or interface triangles in 3D.
pub fn simplex_measure<T, D>(vertices: &[OPoint<T, D>]) -> T
where
    T: Real,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    if vertices.len() <= 1 {
        return T::one();
    }
    let k = vertices.len() - 1;
    let edges: Vec<OVector<T, D>> = vertices[1..]
        .iter()
        .map(|v| v - &vertices[0])
        .collect();
    let gram = DMatrix::from_fn(k, k, |i, j| edges[i].dot(&edges[j]));
    let factorial = (1..=k).fold(T::one(), |acc, i| acc * T::from_usize(i).unwrap());
    gram.determinant().max(T::zero()).sqrt() / factorial
}

/// Lazily constructed barycentric rules, shared between threads.
#[derive(Debug)]
pub struct BarycentricRuleTable<T> {
    rules: RwLock<FxHashMap<(usize, usize), Arc<BarycentricRule<T>>>>,
}

impl<T: Real> Default for BarycentricRuleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> BarycentricRuleTable<T> {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(FxHashMap::default()),
        }
    }

    /// Returns the rule of the given strength for simplices of dimension `simplex_dim`.
    pub fn get(&self, simplex_dim: usize, strength: usize) -> Result<Arc<BarycentricRule<T>>, Error> {
        let key = (simplex_dim, strength);
        if let Some(rule) = self.rules.read().get(&key) {
            return Ok(Arc::clone(rule));
        }
        let rule = Arc::new(BarycentricRule::new(simplex_dim, strength)?);
        Ok(Arc::clone(self.rules.write().entry(key).or_insert(rule)))
    }
}
