//! Level-set functions and their piecewise linear (P1) approximation on a mesh.
use crate::allocators::DimAllocator;
use crate::error::check_len;
use crate::mesh::{Mesh, MeshId};
use crate::{Error, Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, OPoint, OVector, Scalar, U2, U3};
use numeric_literals::replace_float_literals;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A scalar function whose sign partitions space and whose zero set is the interface.
///
/// Evaluation is fallible so that functions backed by external data (e.g. sampled fields or
/// user callbacks) can report failures. Plain closures `Fn(&OPoint<T, D>) -> T` implement this
/// trait.
pub trait LevelSetFunction<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn eval(&self, x: &OPoint<T, D>) -> eyre::Result<T>;

    /// The gradient of the function at `x`.
    ///
    /// The default implementation uses central finite differences.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn gradient(&self, x: &OPoint<T, D>) -> eyre::Result<OVector<T, D>> {
        let mut gradient = OVector::<T, D>::zeros();
        for i in 0..D::dim() {
            let h = 1e-6 * (1.0 + x[i].abs());
            let mut x_plus = x.clone();
            let mut x_minus = x.clone();
            x_plus[i] += h;
            x_minus[i] -= h;
            gradient[i] = (self.eval(&x_plus)? - self.eval(&x_minus)?) / (2.0 * h);
        }
        Ok(gradient)
    }
}

impl<T, D, F> LevelSetFunction<T, D> for F
where
    T: Real,
    D: SmallDim,
    F: Fn(&OPoint<T, D>) -> T,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn eval(&self, x: &OPoint<T, D>) -> eyre::Result<T> {
        Ok(self(x))
    }
}

/// Signed distance to the boundary of a ball, negative inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, <DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
    deserialize = "T: Deserialize<'de>, <DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
))]
pub struct Ball<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub center: OPoint<T, D>,
    pub radius: T,
}

pub type Circle<T> = Ball<T, U2>;
pub type Sphere<T> = Ball<T, U3>;

impl<T, D> Ball<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(center: OPoint<T, D>, radius: T) -> Self {
        Self { center, radius }
    }

    pub fn centered_at_origin(radius: T) -> Self {
        Self::new(OPoint::origin(), radius)
    }
}

impl<T, D> LevelSetFunction<T, D> for Ball<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn eval(&self, x: &OPoint<T, D>) -> eyre::Result<T> {
        Ok((x - &self.center).norm() - self.radius)
    }

    fn gradient(&self, x: &OPoint<T, D>) -> eyre::Result<OVector<T, D>> {
        let d = x - &self.center;
        let norm = d.norm();
        // Undefined at the center
        if norm == T::zero() {
            Ok(OVector::<T, D>::zeros())
        } else {
            Ok(d / norm)
        }
    }
}

/// The linear level set $\phi(x) = n \cdot x - c$.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, <DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
    deserialize = "T: Deserialize<'de>, <DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
))]
pub struct Plane<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub normal: OVector<T, D>,
    pub offset: T,
}

impl<T, D> Plane<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(normal: OVector<T, D>, offset: T) -> Self {
        Self { normal, offset }
    }

    /// The plane through `point` with the given normal.
    pub fn through_point(point: &OPoint<T, D>, normal: OVector<T, D>) -> Self {
        let offset = normal.dot(&point.coords);
        Self { normal, offset }
    }
}

impl<T, D> LevelSetFunction<T, D> for Plane<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn eval(&self, x: &OPoint<T, D>) -> eyre::Result<T> {
        Ok(self.normal.dot(&x.coords) - self.offset)
    }

    fn gradient(&self, _x: &OPoint<T, D>) -> eyre::Result<OVector<T, D>> {
        Ok(self.normal.clone())
    }
}

/// Nodal values of the P1 interpolant of a level-set function, one per mesh vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSetField<T> {
    mesh_id: MeshId,
    values: Vec<T>,
}

impl<T: Real> LevelSetField<T> {
    /// Wraps precomputed vertex values.
    pub fn from_values<D, C>(mesh: &Mesh<T, D, C>, values: Vec<T>) -> Result<Self, Error>
    where
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        check_len(mesh.vertices().len(), values.len())?;
        Ok(Self {
            mesh_id: mesh.id(),
            values,
        })
    }

    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Gathers the values at the given vertices into `out`.
    pub fn gather(&self, vertex_indices: &[usize], out: &mut Vec<T>) {
        out.clear();
        out.extend(vertex_indices.iter().map(|&v| self.values[v]));
    }
}

/// Evaluates the level-set function at every vertex of the mesh.
///
/// Evaluation happens in parallel. If the function fails at any vertex, an error referring to
/// that vertex is returned and no field is produced.
pub fn interpolate_levelset<T, D, C, F>(mesh: &Mesh<T, D, C>, function: &F) -> Result<LevelSetField<T>, Error>
where
    T: Real,
    D: SmallDim,
    F: LevelSetFunction<T, D> + Sync + ?Sized,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Sync,
{
    let values = mesh
        .vertices()
        .par_iter()
        .enumerate()
        .map(|(vertex, x)| {
            function
                .eval(x)
                .map_err(|source| Error::LevelSetEvaluation { vertex, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LevelSetField {
        mesh_id: mesh.id(),
        values,
    })
}
