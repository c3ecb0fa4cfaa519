//! Assembly of finite element systems restricted to a level-set domain.
//!
//! Element matrices are computed in parallel with the rules of a [`LevelSetIntegrator`] and
//! accumulated into a `CooMatrix`, which is converted to CSR. Only elements that intersect the
//! requested domain contribute. Dofs without support in the domain lead to zero rows and
//! columns, which are removed with [`restrict_to_mask`] before the system is handed to a solver.
use crate::allocators::DimAllocator;
use crate::connectivity::SimplexConnectivity;
use crate::cut::DomainType;
use crate::dofs::DofMask;
use crate::element::{barycentric_from_reference, ElementMap};
use crate::error::check_len;
use crate::integrate::LevelSetIntegrator;
use crate::space::{FiniteElementSpace, LagrangeSpace};
use crate::{Error, Real, SmallDim};
use log::debug;
use nalgebra::allocator::Allocator;
use nalgebra::{DMatrix, DVector, DefaultAllocator, OPoint, OVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Operator {
    Mass,
    Stiffness,
}

impl Operator {
    /// Polynomial degree of the integrand for basis functions of the given order.
    fn integrand_order(&self, order: usize) -> usize {
        match self {
            Operator::Mass => 2 * order,
            Operator::Stiffness => 2 * order.saturating_sub(1),
        }
    }
}

fn check_space<T, D, C>(integrator: &LevelSetIntegrator<'_, T, D, C>, space: &LagrangeSpace) -> Result<(), Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    integrator.mesh().id().check(space.mesh_id())
}

fn assemble_element_matrix<T, D, C>(
    integrator: &LevelSetIntegrator<'_, T, D, C>,
    space: &LagrangeSpace,
    element: usize,
    domain: DomainType,
    operator: Operator,
) -> Result<DMatrix<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    let basis = space.basis();
    let n = basis.num_nodes();
    let quadrature = integrator.element_quadrature(element, domain, operator.integrand_order(space.order()))?;
    let geometry = integrator.element_geometry(element)?;

    let mut matrix = DMatrix::zeros(n, n);
    let mut barycentric = vec![T::zero(); D::dim() + 1];
    let mut values = vec![T::zero(); n];
    let mut gradients = vec![OVector::<T, D>::zeros(); n];
    for (w, xi) in quadrature.weights.iter().zip(&quadrature.points) {
        barycentric_from_reference(xi, &mut barycentric);
        match operator {
            Operator::Mass => {
                basis.populate_basis(&barycentric, &mut values);
                for i in 0..n {
                    for j in 0..n {
                        matrix[(i, j)] += *w * values[i] * values[j];
                    }
                }
            }
            Operator::Stiffness => {
                let j_inv_t = match geometry.reference_jacobian(xi).try_inverse() {
                    Some(j_inv) => j_inv.transpose(),
                    None => continue,
                };
                basis.populate_reference_gradients(&barycentric, &mut gradients);
                for gradient in gradients.iter_mut() {
                    *gradient = &j_inv_t * &*gradient;
                }
                for i in 0..n {
                    for j in 0..n {
                        matrix[(i, j)] += *w * gradients[i].dot(&gradients[j]);
                    }
                }
            }
        }
    }
    Ok(matrix)
}

fn assemble_cut_matrix<T, D, C>(
    integrator: &LevelSetIntegrator<'_, T, D, C>,
    space: &LagrangeSpace,
    domain: DomainType,
    operator: Operator,
) -> Result<CsrMatrix<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    check_space(integrator, space)?;
    let elements = integrator
        .classification()
        .elements_in(domain.element_tags());
    let element_matrices = elements
        .par_iter()
        .map(|&element| assemble_element_matrix(integrator, space, element, domain, operator))
        .collect::<Result<Vec<_>, _>>()?;

    let num_dofs = space.num_dofs();
    let mut coo = CooMatrix::new(num_dofs, num_dofs);
    for (&element, matrix) in elements.iter().zip(&element_matrices) {
        let dofs = space.element_dofs(element);
        for (i, &row) in dofs.iter().enumerate() {
            for (j, &col) in dofs.iter().enumerate() {
                coo.push(row, col, matrix[(i, j)]);
            }
        }
    }
    debug!(
        "Assembled {:?} matrix on {} over {} elements ({} dofs)",
        operator,
        domain,
        elements.len(),
        num_dofs
    );
    Ok(CsrMatrix::from(&coo))
}

/// Assembles the mass matrix $\int_{\Omega_d} N_i N_j \, dx$ of the space over the domain.
pub fn assemble_cut_mass_matrix<T, D, C>(
    integrator: &LevelSetIntegrator<'_, T, D, C>,
    space: &LagrangeSpace,
    domain: DomainType,
) -> Result<CsrMatrix<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    assemble_cut_matrix(integrator, space, domain, Operator::Mass)
}

/// Assembles the stiffness matrix $\int_{\Omega_d} \nabla N_i \cdot \nabla N_j \, dx$ of the
/// space over the domain.
pub fn assemble_cut_stiffness_matrix<T, D, C>(
    integrator: &LevelSetIntegrator<'_, T, D, C>,
    space: &LagrangeSpace,
    domain: DomainType,
) -> Result<CsrMatrix<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    assemble_cut_matrix(integrator, space, domain, Operator::Stiffness)
}

/// Assembles the load vector $\int_{\Omega_d} f N_i \, dx$.
///
/// `source_order` is the polynomial degree assumed for `f` when choosing quadrature rules.
pub fn assemble_cut_load_vector<T, D, C, F>(
    integrator: &LevelSetIntegrator<'_, T, D, C>,
    space: &LagrangeSpace,
    domain: DomainType,
    source_order: usize,
    f: F,
) -> Result<DVector<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    F: Fn(&OPoint<T, D>) -> T + Sync,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    check_space(integrator, space)?;
    let basis = space.basis();
    let n = basis.num_nodes();
    let order = space.order() + source_order;
    let elements = integrator
        .classification()
        .elements_in(domain.element_tags());
    let element_vectors = elements
        .par_iter()
        .map(|&element| {
            let quadrature = integrator.element_quadrature(element, domain, order)?;
            let mut vector = DVector::zeros(n);
            let mut barycentric = vec![T::zero(); D::dim() + 1];
            let mut values = vec![T::zero(); n];
            for (w, xi, data) in quadrature.iter() {
                barycentric_from_reference(xi, &mut barycentric);
                basis.populate_basis(&barycentric, &mut values);
                let f_w = f(&data.position) * *w;
                for (v, n_i) in vector.iter_mut().zip(&values) {
                    *v += f_w * *n_i;
                }
            }
            Ok(vector)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut load = DVector::zeros(space.num_dofs());
    for (&element, vector) in elements.iter().zip(&element_vectors) {
        for (&dof, v) in space.element_dofs(element).iter().zip(vector.iter()) {
            load[dof] += *v;
        }
    }
    Ok(load)
}

/// Restricts a square matrix to the rows and columns of the active dofs.
///
/// Returns the restricted matrix and the global index of every restricted dof.
pub fn restrict_to_mask<T: Real>(matrix: &CsrMatrix<T>, mask: &DofMask) -> Result<(CsrMatrix<T>, Vec<usize>), Error> {
    check_len(mask.len(), matrix.nrows())?;
    check_len(mask.len(), matrix.ncols())?;
    let active = mask.active_indices();
    let mut restricted_index = vec![None; mask.len()];
    for (new, &old) in active.iter().enumerate() {
        restricted_index[old] = Some(new);
    }

    let mut coo = CooMatrix::new(active.len(), active.len());
    for (i, j, v) in matrix.triplet_iter() {
        if let (Some(r), Some(c)) = (restricted_index[i], restricted_index[j]) {
            coo.push(r, c, *v);
        }
    }
    Ok((CsrMatrix::from(&coo), active))
}

/// Gathers the entries of `vector` at the given global indices.
pub fn restrict_vector<T: Real>(vector: &DVector<T>, indices: &[usize]) -> DVector<T> {
    DVector::from_iterator(indices.len(), indices.iter().map(|&i| vector[i]))
}
