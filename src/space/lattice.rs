//! Lagrange nodes on simplicial meshes and the corresponding basis functions.
//!
//! The nodes of a Lagrange element of order $k$ on a $d$-simplex sit at the barycentric
//! coordinates $\alpha / k$ for all multi-indices $\alpha \in \mathbb{N}^{d+1}$ with
//! $|\alpha| = k$. A node is labeled globally by the multiset of mesh vertices it is composed
//! of (vertex $v_i$ repeated $\alpha_i$ times), so neighboring elements agree on shared nodes.
use crate::allocators::DimAllocator;
use crate::connectivity::Connectivity;
use crate::mesh::{Mesh, MeshId};
use crate::{Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector, Scalar};
use num::integer::binomial;
use rustc_hash::FxHashMap;

/// Multi-indices of the Lagrange nodes of order `order` on the `dim`-simplex.
///
/// The vertex nodes come first, in vertex order, followed by the remaining nodes in
/// lexicographic order.
pub fn lattice_multi_indices(dim: usize, order: usize) -> Vec<Vec<usize>> {
    fn recurse(remaining_entries: usize, remaining_sum: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining_entries == 1 {
            current.push(remaining_sum);
            out.push(current.clone());
            current.pop();
            return;
        }
        for a in (0..=remaining_sum).rev() {
            current.push(a);
            recurse(remaining_entries - 1, remaining_sum - a, current, out);
            current.pop();
        }
    }

    // There are binomial(k + d, d) multi-indices
    let mut all = Vec::with_capacity(binomial(order + dim, dim));
    recurse(dim + 1, order, &mut Vec::new(), &mut all);

    let is_vertex = |alpha: &Vec<usize>| alpha.iter().filter(|a| **a > 0).count() <= 1;
    let mut indices: Vec<_> = (0..=dim)
        .map(|i| {
            let mut alpha = vec![0; dim + 1];
            alpha[i] = order;
            alpha
        })
        .collect();
    if order > 0 {
        indices.extend(all.into_iter().filter(|alpha| !is_vertex(alpha)));
    } else {
        // A single constant node
        indices.truncate(1);
    }
    indices
}

/// Value and derivative of $\ell_a(t) = \prod_{m=0}^{a-1} (k t - m) / (m + 1)$.
fn silvester_factor<T: Real>(a: usize, order: usize, t: T) -> (T, T) {
    let k = T::from_usize(order).unwrap();
    let mut value = T::one();
    let mut derivative = T::zero();
    for m in 0..a {
        let denominator = T::from_usize(m + 1).unwrap();
        let factor = (k * t - T::from_usize(m).unwrap()) / denominator;
        let factor_derivative = k / denominator;
        derivative = derivative * factor + value * factor_derivative;
        value *= factor;
    }
    (value, derivative)
}

/// The Lagrange basis of a given order on the reference simplex, in Silvester's product form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeSimplexBasis {
    dim: usize,
    order: usize,
    multi_indices: Vec<Vec<usize>>,
}

impl LagrangeSimplexBasis {
    pub fn new(dim: usize, order: usize) -> Self {
        Self {
            dim,
            order,
            multi_indices: lattice_multi_indices(dim, order),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_nodes(&self) -> usize {
        self.multi_indices.len()
    }

    pub fn multi_indices(&self) -> &[Vec<usize>] {
        &self.multi_indices
    }

    /// Barycentric coordinates of the given local node.
    pub fn node_barycentric<T: Real>(&self, local_node: usize) -> Vec<T> {
        let k = T::from_usize(self.order.max(1)).unwrap();
        self.multi_indices[local_node]
            .iter()
            .map(|&a| T::from_usize(a).unwrap() / k)
            .collect()
    }

    /// Evaluates all basis functions at the point with the given barycentric coordinates.
    pub fn populate_basis<T: Real>(&self, barycentric: &[T], values: &mut [T]) {
        assert_eq!(barycentric.len(), self.dim + 1);
        assert_eq!(values.len(), self.num_nodes());
        if self.order == 0 {
            values[0] = T::one();
            return;
        }
        for (value, alpha) in values.iter_mut().zip(&self.multi_indices) {
            *value = alpha
                .iter()
                .zip(barycentric)
                .map(|(&a, &lambda)| silvester_factor(a, self.order, lambda).0)
                .fold(T::one(), |acc, f| acc * f);
        }
    }

    /// Evaluates the gradients of all basis functions with respect to reference coordinates at
    /// the point with the given barycentric coordinates.
    pub fn populate_reference_gradients<T, D>(&self, barycentric: &[T], gradients: &mut [OVector<T, D>])
    where
        T: Real,
        D: DimName,
        DefaultAllocator: Allocator<T, D>,
    {
        assert_eq!(barycentric.len(), self.dim + 1);
        assert_eq!(D::dim(), self.dim);
        assert_eq!(gradients.len(), self.num_nodes());
        let half = T::from_f64(0.5).unwrap();
        let mut factors = vec![(T::zero(), T::zero()); self.dim + 1];
        let mut barycentric_gradient = vec![T::zero(); self.dim + 1];
        for (gradient, alpha) in gradients.iter_mut().zip(&self.multi_indices) {
            for (factor, (&a, &lambda)) in factors.iter_mut().zip(alpha.iter().zip(barycentric)) {
                *factor = silvester_factor(a, self.order, lambda);
            }
            // Derivatives with respect to each barycentric coordinate
            for (i, dn) in barycentric_gradient.iter_mut().enumerate() {
                *dn = factors
                    .iter()
                    .enumerate()
                    .map(|(j, (value, derivative))| if i == j { *derivative } else { *value })
                    .fold(T::one(), |acc, f| acc * f);
            }
            // lambda_{d+1} = (xi_d + 1) / 2 and lambda_0 = 1 - sum of the others
            for d in 0..self.dim {
                gradient[d] = (barycentric_gradient[d + 1] - barycentric_gradient[0]) * half;
            }
        }
    }
}

/// Globally numbered Lagrange nodes of a given order on a simplicial mesh.
///
/// Vertex nodes come first and coincide with the mesh vertex indices. The remaining nodes are
/// numbered in the order in which they are first encountered when traversing the elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeNodes {
    mesh_id: MeshId,
    basis: LagrangeSimplexBasis,
    num_nodes: usize,
    element_nodes: Vec<usize>,
    // Sorted vertex multiset of every non-vertex node
    labels: Vec<Vec<usize>>,
    num_vertices: usize,
}

impl LagrangeNodes {
    /// # Panics
    ///
    /// Panics if `order == 0`.
    pub fn from_mesh<T, D, C>(mesh: &Mesh<T, D, C>, order: usize) -> Self
    where
        T: Scalar,
        D: DimName,
        C: Connectivity,
        DefaultAllocator: Allocator<T, D>,
    {
        assert!(order >= 1, "Lagrange nodes require order >= 1");
        let basis = LagrangeSimplexBasis::new(D::dim(), order);
        let num_vertices = mesh.vertices().len();
        let mut label_map: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
        let mut labels = Vec::new();
        let mut element_nodes = Vec::with_capacity(basis.num_nodes() * mesh.num_elements());

        for conn in mesh.connectivity() {
            let vertices = conn.vertex_indices();
            for alpha in basis.multi_indices() {
                let mut label: Vec<usize> = alpha
                    .iter()
                    .zip(vertices)
                    .flat_map(|(&a, &v)| std::iter::repeat(v).take(a))
                    .collect();
                label.sort_unstable();
                let node = if label.first() == label.last() {
                    // Vertex node
                    label[0]
                } else {
                    *label_map.entry(label.clone()).or_insert_with(|| {
                        labels.push(label);
                        num_vertices + labels.len() - 1
                    })
                };
                element_nodes.push(node);
            }
        }

        Self {
            mesh_id: mesh.id(),
            num_nodes: num_vertices + labels.len(),
            basis,
            element_nodes,
            labels,
            num_vertices,
        }
    }

    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn order(&self) -> usize {
        self.basis.order()
    }

    pub fn basis(&self) -> &LagrangeSimplexBasis {
        &self.basis
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_elements(&self) -> usize {
        self.element_nodes.len() / self.basis.num_nodes()
    }

    /// Global node indices of the element, in the local node order of the basis.
    pub fn element_nodes(&self, element: usize) -> &[usize] {
        let n = self.basis.num_nodes();
        &self.element_nodes[n * element..n * (element + 1)]
    }

    /// The distinct mesh vertices the node is composed of.
    pub fn support_vertices(&self, node: usize) -> Vec<usize> {
        if node < self.num_vertices {
            vec![node]
        } else {
            let mut vertices = self.labels[node - self.num_vertices].clone();
            vertices.dedup();
            vertices
        }
    }

    /// Position of the node on the undeformed mesh.
    pub fn node_position<T, D, C>(&self, mesh: &Mesh<T, D, C>, node: usize) -> OPoint<T, D>
    where
        T: Real,
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        if node < self.num_vertices {
            mesh.vertices()[node].clone()
        } else {
            let label = &self.labels[node - self.num_vertices];
            let sum = label
                .iter()
                .fold(OVector::<T, D>::zeros(), |acc, &v| acc + &mesh.vertices()[v].coords);
            OPoint::from(sum / T::from_usize(label.len()).unwrap())
        }
    }
}
