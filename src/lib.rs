//! Integration on level-set domains and cut finite element machinery.
//!
//! `cutfem` implements the geometric core of unfitted finite element methods on simplicial
//! meshes. A level-set function $\phi$ partitions the domain into the negative region
//! $\Omega_- = \{ \phi < 0 \}$, the positive region $\Omega_+ = \{ \phi > 0 \}$ and the
//! interface $\Gamma = \{ \phi = 0 \}$. The typical pipeline is
//!
//! 1. [`levelset::interpolate_levelset`]: nodal P1 approximation of $\phi$,
//! 2. [`classify::classify_elements`]: negative/positive/cut tags for every element,
//! 3. [`integrate::LevelSetIntegrator`]: quadrature on $\Omega_-$, $\Omega_+$ or $\Gamma$,
//! 4. [`dofs::dofs_of_elements`]: active degrees of freedom of restricted spaces,
//! 5. [`deformation::deform`]: optional isoparametric correction of the interface geometry.
//!
//! Every derived quantity remembers the [`mesh::MeshId`] of the mesh it was computed on, and
//! combining data from different meshes is reported as [`Error::StaleData`].

use nalgebra::{DimMin, DimName, RealField};

pub mod allocators;
pub mod assembly;
pub mod classify;
pub mod connectivity;
pub mod cut;
pub mod deformation;
pub mod dofs;
pub mod element;
pub mod error;
pub mod integrate;
pub mod levelset;
pub mod mesh;
pub mod nitsche;
pub mod quadrature;
pub mod space;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::Error;

/// Trait alias for the scalar types supported by `cutfem`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic `cutfem` routines.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
