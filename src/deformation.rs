//! Isoparametric correction of the piecewise linear interface.
//!
//! The zero level of the P1 interpolant $\phi_h$ is only a second order accurate approximation
//! of the interface. The correction computes a continuous, piecewise polynomial displacement
//! $d$ of order $k$ such that the mapped P1 interface $\Psi(\{\phi_h = 0\})$, with
//! $\Psi = \mathrm{id} + d$, approximates the zero level of the exact level set to order
//! $k + 1$. Integration on the deformed mesh then maps the (cheap) P1 decomposition through
//! $\Psi$.
//!
//! For every Lagrange node $x$ of a cut element, a one-dimensional Newton iteration finds $s$
//! with $\phi(x + s G) = \phi_h(x)$ along a search direction $G$. The displacement $s G$ is
//! capped in length by a threshold, and contributions of different elements to the same node
//! are averaged. Nodes outside of cut elements are not displaced.
use crate::allocators::DimAllocator;
use crate::classify::{ElementClassification, TagSet};
use crate::connectivity::SimplexConnectivity;
use crate::element::{barycentric_from_reference, evaluate_linear, reference_from_barycentric, ElementMap, SimplexElement};
use crate::levelset::{LevelSetField, LevelSetFunction};
use crate::mesh::{Mesh, MeshId};
use crate::space::{LagrangeNodes, LagrangeSimplexBasis};
use crate::{Error, Real, SmallDim};
use log::{debug, warn};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};
use numeric_literals::replace_float_literals;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Elements whose deformed Jacobian determinant drops below this fraction of the undeformed
/// determinant are damped.
pub const MIN_JACOBIAN_RATIO: f64 = 0.1;

/// Number of times the displacements of an element are halved before they are set to zero.
pub const MAX_DAMPING_STEPS: usize = 8;

const MAX_NEWTON_ITERATIONS: usize = 20;
const NEWTON_TOLERANCE: f64 = 1e-14;

/// Maximum number of sweeps of the inversion guard over the displaced elements.
const MAX_GUARD_SWEEPS: usize = 4;

/// Configuration of the isoparametric correction.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformationSettings {
    /// Polynomial order of the displacement field.
    pub order: usize,
    /// Upper bound on the length of the displacement of a node.
    pub threshold: f64,
    /// Use the element-wise constant gradient of the P1 interpolant as search direction instead
    /// of the gradient of the exact level set.
    pub discontinuous_qn: bool,
}

impl Default for DeformationSettings {
    fn default() -> Self {
        Self {
            order: 2,
            threshold: 0.1,
            discontinuous_qn: false,
        }
    }
}

/// Displacements at the Lagrange nodes of order `k` of a mesh.
#[derive(Debug, Clone)]
pub struct DeformationField<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    nodes: LagrangeNodes,
    displacements: Vec<OVector<T, D>>,
    displaced_elements: Vec<bool>,
    damped_elements: Vec<usize>,
}

impl<T, D> DeformationField<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// A field without any displacement.
    pub fn zero<C>(mesh: &Mesh<T, D, C>, order: usize) -> Self
    where
        C: SimplexConnectivity<D>,
    {
        let nodes = LagrangeNodes::from_mesh(mesh, order.max(1));
        Self::from_nodes(nodes)
    }

    fn from_nodes(nodes: LagrangeNodes) -> Self {
        Self {
            displacements: vec![OVector::<T, D>::zeros(); nodes.num_nodes()],
            displaced_elements: vec![false; nodes.num_elements()],
            damped_elements: Vec::new(),
            nodes,
        }
    }

    pub fn mesh_id(&self) -> MeshId {
        self.nodes.mesh_id()
    }

    pub fn order(&self) -> usize {
        self.nodes.order()
    }

    pub fn nodes(&self) -> &LagrangeNodes {
        &self.nodes
    }

    pub fn displacements(&self) -> &[OVector<T, D>] {
        &self.displacements
    }

    pub fn node_displacement(&self, node: usize) -> Option<&OVector<T, D>> {
        self.displacements.get(node)
    }

    /// Displacement of a mesh vertex.
    ///
    /// Vertices are nodes of the Lagrange lattice. Since the P1 interpolant is exact at the
    /// vertices, their displacement is zero unless the field has order 1.
    pub fn vertex_displacement(&self, vertex: usize) -> Option<&OVector<T, D>> {
        if vertex < self.nodes.num_vertices() {
            self.displacements.get(vertex)
        } else {
            None
        }
    }

    /// Elements that were damped to prevent inversion, sorted.
    pub fn damped_elements(&self) -> &[usize] {
        &self.damped_elements
    }

    pub fn is_element_displaced(&self, element: usize) -> bool {
        self.displaced_elements.get(element).copied().unwrap_or(false)
    }

    pub fn num_displaced_nodes(&self) -> usize {
        self.displacements
            .iter()
            .filter(|d| d.iter().any(|x| *x != T::zero()))
            .count()
    }

    pub fn max_displacement(&self) -> T {
        self.displacements
            .iter()
            .map(|d| d.norm())
            .fold(T::zero(), |acc, n| acc.max(n))
    }

    /// The deformed element map `Ψ = id + d` restricted to the element.
    ///
    /// Returns `None` if the element is not displaced.
    pub fn deformed_element(&self, element: usize, simplex: SimplexElement<T, D>) -> Option<DeformedElement<'_, T, D>> {
        if !self.is_element_displaced(element) {
            return None;
        }
        let displacements = self
            .nodes
            .element_nodes(element)
            .iter()
            .map(|&node| self.displacements[node].clone())
            .collect();
        Some(DeformedElement {
            simplex,
            basis: self.nodes.basis(),
            displacements,
        })
    }

    fn update_displaced_elements(&mut self) {
        let is_displaced: Vec<bool> = self
            .displacements
            .iter()
            .map(|d| d.iter().any(|x| *x != T::zero()))
            .collect();
        for element in 0..self.nodes.num_elements() {
            self.displaced_elements[element] = self
                .nodes
                .element_nodes(element)
                .iter()
                .any(|&node| is_displaced[node]);
        }
    }
}

/// A simplex element mapped through a polynomial displacement field.
#[derive(Debug, Clone)]
pub struct DeformedElement<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    simplex: SimplexElement<T, D>,
    basis: &'a LagrangeSimplexBasis,
    displacements: Vec<OVector<T, D>>,
}

impl<'a, T, D> DeformedElement<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn undeformed(&self) -> &SimplexElement<T, D> {
        &self.simplex
    }

    pub fn order(&self) -> usize {
        self.basis.order()
    }
}

impl<'a, T, D> ElementMap<T, D> for DeformedElement<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn map_reference_coords(&self, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let mut barycentric = vec![T::zero(); D::dim() + 1];
        barycentric_from_reference(reference_coords, &mut barycentric);
        let mut basis_values = vec![T::zero(); self.basis.num_nodes()];
        self.basis.populate_basis(&barycentric, &mut basis_values);

        let mut x = self.simplex.map_reference_coords(reference_coords);
        for (n, u) in basis_values.iter().zip(&self.displacements) {
            x.coords += u * *n;
        }
        x
    }

    fn reference_jacobian(&self, reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D> {
        let mut barycentric = vec![T::zero(); D::dim() + 1];
        barycentric_from_reference(reference_coords, &mut barycentric);
        let mut gradients = vec![OVector::<T, D>::zeros(); self.basis.num_nodes()];
        self.basis
            .populate_reference_gradients(&barycentric, &mut gradients);

        let mut jacobian = self.simplex.jacobian();
        for (grad, u) in gradients.iter().zip(&self.displacements) {
            jacobian += u * grad.transpose();
        }
        jacobian
    }
}

/// Solves $\phi(x + s G) = \text{target}$ for $s$ with $|s G| \leq \text{threshold}$.
///
/// Returns the displacement $s G$ of the last iterate.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn newton_along_direction<T, D, F>(
    function: &F,
    x: &OPoint<T, D>,
    direction: &OVector<T, D>,
    target: T,
    threshold: T,
) -> eyre::Result<OVector<T, D>>
where
    T: Real,
    D: SmallDim,
    F: LevelSetFunction<T, D> + ?Sized,
    DefaultAllocator: DimAllocator<T, D>,
{
    let direction_norm = direction.norm();
    if direction_norm == 0.0 {
        return Ok(OVector::<T, D>::zeros());
    }
    let s_max = threshold / direction_norm;
    let tolerance = T::from_f64(NEWTON_TOLERANCE).unwrap() * (1.0 + target.abs());

    let mut s = 0.0;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let y = x + direction * s;
        let residual = function.eval(&y)? - target;
        if residual.abs() <= tolerance {
            return Ok(direction * s);
        }
        let slope = function.gradient(&y)?.dot(direction);
        if slope == 0.0 {
            break;
        }
        s = (s - residual / slope).max(-s_max).min(s_max);
    }
    debug!("Newton iteration for isoparametric node displacement did not converge");
    Ok(direction * s)
}

/// Displacement contributions of a single cut element, as `(node, displacement)` pairs.
fn element_contributions<T, D, C, F>(
    mesh: &Mesh<T, D, C>,
    nodes: &LagrangeNodes,
    function: &F,
    field: &LevelSetField<T>,
    element: usize,
    settings: &DeformationSettings,
) -> Result<Vec<(usize, OVector<T, D>)>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    F: LevelSetFunction<T, D> + ?Sized,
    DefaultAllocator: DimAllocator<T, D>,
{
    let simplex = mesh.checked_simplex_element(element)?;
    let vertex_indices = mesh.vertices_of(element).unwrap_or(&[]);
    let mut values = Vec::new();
    field.gather(vertex_indices, &mut values);

    let linear_gradient = simplex.linear_gradient(&values);
    let threshold = T::from_f64(settings.threshold).unwrap();
    let basis = nodes.basis();

    let mut contributions = Vec::with_capacity(basis.num_nodes());
    for (local, &node) in nodes.element_nodes(element).iter().enumerate() {
        // Vertices are not displaced, the linear interpolant is exact there
        if node < nodes.num_vertices() {
            continue;
        }
        let xi = reference_from_barycentric::<T, D>(&basis.node_barycentric::<T>(local));
        let x = simplex.map_reference_coords(&xi);
        let target = evaluate_linear(&values, &xi);

        let result = if settings.discontinuous_qn {
            match &linear_gradient {
                Some(direction) => newton_along_direction(function, &x, direction, target, threshold),
                None => Ok(OVector::<T, D>::zeros()),
            }
        } else {
            function
                .gradient(&x)
                .and_then(|direction| newton_along_direction(function, &x, &direction, target, threshold))
        };
        let displacement =
            result.map_err(|source| Error::LevelSetEvaluationInElement { element, source })?;
        contributions.push((node, displacement));
    }
    Ok(contributions)
}

/// Sample points for the inversion guard: the lattice nodes and the barycenter.
fn guard_sample_points<T, D>(basis: &LagrangeSimplexBasis) -> Vec<OPoint<T, D>>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut points: Vec<_> = (0..basis.num_nodes())
        .map(|local| reference_from_barycentric::<T, D>(&basis.node_barycentric::<T>(local)))
        .collect();
    let n = T::from_usize(D::dim() + 1).unwrap();
    let barycenter = vec![T::one() / n; D::dim() + 1];
    points.push(reference_from_barycentric(&barycenter));
    points
}

fn is_inverted<T, D>(deformed: &DeformedElement<'_, T, D>, samples: &[OPoint<T, D>]) -> bool
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let reference_det = deformed.undeformed().jacobian().determinant();
    if reference_det == T::zero() {
        return false;
    }
    let min_ratio = T::from_f64(MIN_JACOBIAN_RATIO).unwrap();
    samples.iter().any(|xi| {
        let ratio = deformed.reference_jacobian(xi).determinant() / reference_det;
        !(ratio >= min_ratio)
    })
}

/// Computes the isoparametric deformation for the cut elements of the mesh.
///
/// `function` is the exact level set, `field` and `classification` its P1 approximation and the
/// resulting element tags on `mesh`.
pub fn deform<T, D, C, F>(
    mesh: &Mesh<T, D, C>,
    function: &F,
    field: &LevelSetField<T>,
    classification: &ElementClassification,
    settings: &DeformationSettings,
) -> Result<DeformationField<T, D>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    F: LevelSetFunction<T, D> + Sync + ?Sized,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    mesh.id().check(field.mesh_id())?;
    mesh.id().check(classification.mesh_id())?;

    let nodes = LagrangeNodes::from_mesh(mesh, settings.order.max(1));
    let mut deformation = DeformationField::from_nodes(nodes);
    if deformation.order() == 1 {
        return Ok(deformation);
    }

    let cut_elements = classification.elements_in(TagSet::IF);
    let contributions = cut_elements
        .par_iter()
        .map(|&element| element_contributions(mesh, &deformation.nodes, function, field, element, settings))
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = vec![0usize; deformation.nodes.num_nodes()];
    for (node, displacement) in contributions.into_iter().flatten() {
        deformation.displacements[node] += displacement;
        counts[node] += 1;
    }
    for (displacement, count) in deformation.displacements.iter_mut().zip(&counts) {
        if *count > 1 {
            *displacement /= T::from_usize(*count).unwrap();
        }
    }
    deformation.update_displaced_elements();

    apply_inversion_guard(mesh, &mut deformation);

    debug!(
        "Isoparametric deformation of order {}: {} cut elements, {} displaced nodes, {} damped elements",
        deformation.order(),
        cut_elements.len(),
        deformation.num_displaced_nodes(),
        deformation.damped_elements.len()
    );
    Ok(deformation)
}

fn element_is_inverted<T, D, C>(
    mesh: &Mesh<T, D, C>,
    deformation: &DeformationField<T, D>,
    element: usize,
    samples: &[OPoint<T, D>],
) -> bool
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh.simplex_element(element)
        .and_then(|simplex| deformation.deformed_element(element, simplex))
        .map_or(false, |deformed| is_inverted(&deformed, samples))
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn apply_inversion_guard<T, D, C>(mesh: &Mesh<T, D, C>, deformation: &mut DeformationField<T, D>)
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let samples = guard_sample_points::<T, D>(deformation.nodes.basis());
    let mut damped = Vec::new();

    for _ in 0..MAX_GUARD_SWEEPS {
        let mut any_damped = false;
        for element in 0..mesh.num_elements() {
            let mut steps = 0;
            while element_is_inverted(mesh, deformation, element, &samples) {
                let element_nodes = deformation.nodes.element_nodes(element).to_vec();
                if steps < MAX_DAMPING_STEPS {
                    for node in element_nodes {
                        deformation.displacements[node] *= 0.5;
                    }
                    steps += 1;
                } else {
                    for node in element_nodes {
                        deformation.displacements[node].fill(T::zero());
                    }
                    warn!(
                        "Isoparametric displacement of element {} removed to prevent inversion",
                        element
                    );
                    break;
                }
            }
            if steps > 0 {
                warn!(
                    "Isoparametric displacement of element {} damped {} times to prevent inversion",
                    element, steps
                );
                damped.push(element);
                any_damped = true;
            }
        }
        deformation.update_displaced_elements();
        if !any_damped {
            break;
        }
    }

    // Damping in the last sweep may have moved nodes shared with elements checked earlier
    zero_inverted_elements(mesh, deformation, &samples, &mut damped);

    damped.sort_unstable();
    damped.dedup();
    deformation.damped_elements = damped;
}

/// Removes the displacement of every element that is still inverted.
///
/// An element without displacement is never inverted, and zeroing only removes displacement,
/// so every pass fixes at least one element for good and the loop terminates.
fn zero_inverted_elements<T, D, C>(
    mesh: &Mesh<T, D, C>,
    deformation: &mut DeformationField<T, D>,
    samples: &[OPoint<T, D>],
    damped: &mut Vec<usize>,
) where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    loop {
        let mut any_zeroed = false;
        for element in 0..mesh.num_elements() {
            if element_is_inverted(mesh, deformation, element, samples) {
                for &node in deformation.nodes.element_nodes(element) {
                    deformation.displacements[node].fill(T::zero());
                }
                warn!(
                    "Isoparametric displacement of element {} removed to prevent inversion",
                    element
                );
                damped.push(element);
                any_zeroed = true;
            }
        }
        deformation.update_displaced_elements();
        if !any_zeroed {
            break;
        }
    }
}
