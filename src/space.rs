//! Finite element spaces on simplicial meshes, described by their degrees of freedom.
use crate::connectivity::Connectivity;
use crate::dofs::DofMask;
use crate::error::check_len;
use crate::mesh::{Mesh, MeshFacets, MeshId};
use crate::Error;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar};

pub mod lattice;

pub use lattice::{LagrangeNodes, LagrangeSimplexBasis};

/// The degree-of-freedom structure of a finite element space.
pub trait FiniteElementSpace {
    fn mesh_id(&self) -> MeshId;

    fn num_dofs(&self) -> usize;

    fn num_elements(&self) -> usize;

    /// Global indices of the dofs whose basis functions are supported on the element.
    ///
    /// # Panics
    ///
    /// May panic if the element index is out of bounds.
    fn element_dofs(&self, element: usize) -> &[usize];

    /// Dofs that are not constrained by the space itself, e.g. by Dirichlet conditions.
    fn native_free_dofs(&self) -> DofMask {
        DofMask::full(self.mesh_id(), self.num_dofs())
    }
}

impl<S: FiniteElementSpace + ?Sized> FiniteElementSpace for &S {
    fn mesh_id(&self) -> MeshId {
        S::mesh_id(self)
    }

    fn num_dofs(&self) -> usize {
        S::num_dofs(self)
    }

    fn num_elements(&self) -> usize {
        S::num_elements(self)
    }

    fn element_dofs(&self, element: usize) -> &[usize] {
        S::element_dofs(self, element)
    }

    fn native_free_dofs(&self) -> DofMask {
        S::native_free_dofs(self)
    }
}

/// Continuous Lagrange space of order `k >= 1` on a simplicial mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeSpace {
    nodes: LagrangeNodes,
    constrained: Vec<bool>,
}

impl LagrangeSpace {
    /// # Panics
    ///
    /// Panics if `order == 0`.
    pub fn new<T, D, C>(mesh: &Mesh<T, D, C>, order: usize) -> Self
    where
        T: Scalar,
        D: DimName,
        C: Connectivity,
        DefaultAllocator: Allocator<T, D>,
    {
        let nodes = LagrangeNodes::from_mesh(mesh, order);
        let constrained = vec![false; nodes.num_nodes()];
        Self { nodes, constrained }
    }

    /// Constrains all dofs on the boundary of the mesh (homogeneous Dirichlet conditions).
    pub fn with_dirichlet_boundary<T, D, C>(mut self, mesh: &Mesh<T, D, C>) -> Result<Self, Error>
    where
        T: Scalar,
        D: DimName,
        C: Connectivity,
        DefaultAllocator: Allocator<T, D>,
    {
        self.nodes.mesh_id().check(mesh.id())?;
        let facets = MeshFacets::from_mesh(mesh);
        let mut on_boundary = vec![false; mesh.vertices().len()];
        for facet in facets.boundary_facets() {
            for &v in facets.vertices_of(facet) {
                on_boundary[v] = true;
            }
        }

        // A node lies on the boundary iff all of its support vertices lie on one boundary
        // facet. Those vertices are all boundary vertices and share a face of the element.
        let boundary_facets: Vec<&[usize]> = facets
            .boundary_facets()
            .map(|facet| facets.vertices_of(facet))
            .collect();
        for node in 0..self.nodes.num_nodes() {
            let support = self.nodes.support_vertices(node);
            if !support.iter().all(|&v| on_boundary[v]) {
                continue;
            }
            let is_boundary_node = support.len() == 1
                || boundary_facets
                    .iter()
                    .any(|facet| support.iter().all(|v| facet.binary_search(v).is_ok()));
            if is_boundary_node {
                self.constrained[node] = true;
            }
        }
        Ok(self)
    }

    pub fn order(&self) -> usize {
        self.nodes.order()
    }

    pub fn nodes(&self) -> &LagrangeNodes {
        &self.nodes
    }

    pub fn basis(&self) -> &LagrangeSimplexBasis {
        self.nodes.basis()
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.constrained.get(dof).copied().unwrap_or(false)
    }
}

impl FiniteElementSpace for LagrangeSpace {
    fn mesh_id(&self) -> MeshId {
        self.nodes.mesh_id()
    }

    fn num_dofs(&self) -> usize {
        self.nodes.num_nodes()
    }

    fn num_elements(&self) -> usize {
        self.nodes.num_elements()
    }

    fn element_dofs(&self, element: usize) -> &[usize] {
        self.nodes.element_nodes(element)
    }

    fn native_free_dofs(&self) -> DofMask {
        DofMask::from_flags(self.mesh_id(), self.constrained.iter().map(|c| !c).collect())
    }
}

/// A product of spaces on the same mesh with concatenated dof numbering.
///
/// The dofs of component `i` are offset by the total number of dofs of components `0..i`.
/// Two-sided discretizations use one component per side of the interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSpace<S> {
    components: Vec<S>,
    offsets: Vec<usize>,
    element_offsets: Vec<usize>,
    element_dofs: Vec<usize>,
}

impl<S: FiniteElementSpace> ProductSpace<S> {
    /// Combines the components, which must all be defined on the same mesh.
    ///
    /// # Panics
    ///
    /// Panics if `components` is empty.
    pub fn new(components: Vec<S>) -> Result<Self, Error> {
        assert!(!components.is_empty(), "A product space needs at least one component");
        let mesh_id = components[0].mesh_id();
        let num_elements = components[0].num_elements();
        for component in &components[1..] {
            mesh_id.check(component.mesh_id())?;
            check_len(num_elements, component.num_elements())?;
        }

        let mut offsets = Vec::with_capacity(components.len() + 1);
        offsets.push(0);
        for component in &components {
            let last = *offsets.last().unwrap_or(&0);
            offsets.push(last + component.num_dofs());
        }

        let mut element_offsets = vec![0];
        let mut element_dofs = Vec::new();
        for element in 0..num_elements {
            for (component, offset) in components.iter().zip(&offsets) {
                element_dofs.extend(component.element_dofs(element).iter().map(|dof| dof + offset));
            }
            element_offsets.push(element_dofs.len());
        }

        Ok(Self {
            components,
            offsets,
            element_offsets,
            element_dofs,
        })
    }

    pub fn components(&self) -> &[S] {
        &self.components
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Global index of the first dof of the given component.
    pub fn component_offset(&self, component: usize) -> usize {
        self.offsets[component]
    }
}

impl<S: FiniteElementSpace> FiniteElementSpace for ProductSpace<S> {
    fn mesh_id(&self) -> MeshId {
        self.components[0].mesh_id()
    }

    fn num_dofs(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    fn num_elements(&self) -> usize {
        self.element_offsets.len() - 1
    }

    fn element_dofs(&self, element: usize) -> &[usize] {
        &self.element_dofs[self.element_offsets[element]..self.element_offsets[element + 1]]
    }

    fn native_free_dofs(&self) -> DofMask {
        let masks: Vec<_> = self
            .components
            .iter()
            .map(|c| c.native_free_dofs())
            .collect();
        DofMask::concat(&masks).expect("Components share the same mesh")
    }
}
