//! Uniform refinement of simplicial meshes.
//!
//! Triangles are split into four similar triangles by connecting the edge midpoints. Tetrahedra
//! are split with the red refinement rule into four corner tetrahedra and four tetrahedra
//! filling the inner octahedron, which is cut along one of its diagonals.
use crate::connectivity::{Connectivity, Tet4Connectivity, Tri3d2Connectivity};
use crate::mesh::Mesh;
use crate::Real;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint};
use numeric_literals::replace_float_literals;
use rustc_hash::FxHashMap;

/// A vertex of a refined mesh, labeled in terms of the vertices of the parent mesh.
///
/// Labels are globally consistent: neighboring cells produce identical labels for shared
/// vertices, which is what makes the refined mesh conforming.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RefinedVertex {
    Vertex(usize),
    /// Midpoint of an edge, stored with sorted vertex indices.
    EdgeMidpoint([usize; 2]),
}

impl RefinedVertex {
    pub fn midpoint(a: usize, b: usize) -> Self {
        Self::EdgeMidpoint([a.min(b), a.max(b)])
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn position<T, D>(&self, vertices: &[OPoint<T, D>]) -> OPoint<T, D>
    where
        T: Real,
        D: DimName,
        DefaultAllocator: Allocator<T, D>,
    {
        match *self {
            Self::Vertex(idx) => vertices[idx].clone(),
            Self::EdgeMidpoint([a, b]) => OPoint::from((&vertices[a].coords + &vertices[b].coords) * 0.5),
        }
    }
}

/// Connectivity types that support uniform refinement.
pub trait RefineUniformly: Connectivity {
    /// Number of children produced by a single cell.
    const NUM_CHILDREN: usize;

    /// Appends the vertex labels of every child cell, `vertex_indices().len()` labels per child.
    fn populate_children(&self, labels: &mut Vec<RefinedVertex>);

    fn from_refined_indices(indices: &[usize]) -> Self;
}

impl RefineUniformly for Tri3d2Connectivity {
    const NUM_CHILDREN: usize = 4;

    fn populate_children(&self, labels: &mut Vec<RefinedVertex>) {
        let [a, b, c] = self.0;
        let ab = RefinedVertex::midpoint(a, b);
        let bc = RefinedVertex::midpoint(b, c);
        let ca = RefinedVertex::midpoint(c, a);
        let [a, b, c] = [a, b, c].map(RefinedVertex::Vertex);
        labels.extend_from_slice(&[a, ab, ca, ab, b, bc, ca, bc, c, ab, bc, ca]);
    }

    fn from_refined_indices(indices: &[usize]) -> Self {
        Self([indices[0], indices[1], indices[2]])
    }
}

impl RefineUniformly for Tet4Connectivity {
    const NUM_CHILDREN: usize = 8;

    fn populate_children(&self, labels: &mut Vec<RefinedVertex>) {
        let [a, b, c, d] = self.0;
        let ab = RefinedVertex::midpoint(a, b);
        let ac = RefinedVertex::midpoint(a, c);
        let ad = RefinedVertex::midpoint(a, d);
        let bc = RefinedVertex::midpoint(b, c);
        let bd = RefinedVertex::midpoint(b, d);
        let cd = RefinedVertex::midpoint(c, d);
        let [a, b, c, d] = [a, b, c, d].map(RefinedVertex::Vertex);
        #[rustfmt::skip]
        let children = [
            // Corners
            a, ab, ac, ad,
            ab, b, bc, bd,
            ac, bc, c, cd,
            ad, bd, cd, d,
            // Octahedron around the diagonal ac-bd
            ac, bd, ab, bc,
            ac, bd, bc, cd,
            ac, bd, cd, ad,
            ac, bd, ad, ab,
        ];
        labels.extend_from_slice(&children);
    }

    fn from_refined_indices(indices: &[usize]) -> Self {
        Self([indices[0], indices[1], indices[2], indices[3]])
    }
}

/// Apply one round of uniform mesh refinement.
///
/// The refined mesh receives a new [`MeshId`](crate::mesh::MeshId), so data derived from the
/// coarse mesh is rejected when combined with it.
pub fn refine_uniformly<T, D, C>(mesh: &Mesh<T, D, C>) -> Mesh<T, D, C>
where
    T: Real,
    D: DimName,
    C: RefineUniformly,
    DefaultAllocator: Allocator<T, D>,
{
    let mut label_to_idx_map: FxHashMap<RefinedVertex, usize> = FxHashMap::default();
    let mut new_labels = Vec::new();
    let mut new_connectivity = Vec::with_capacity(C::NUM_CHILDREN * mesh.num_elements());

    // Local buffers
    let mut labels = Vec::new();
    let mut indices = Vec::new();
    for conn in mesh.connectivity() {
        labels.clear();
        conn.populate_children(&mut labels);
        let vertices_per_cell = conn.vertex_indices().len();
        for child_labels in labels.chunks_exact(vertices_per_cell) {
            indices.clear();
            for label in child_labels {
                let idx = *label_to_idx_map.entry(*label).or_insert_with(|| {
                    new_labels.push(*label);
                    new_labels.len() - 1
                });
                indices.push(idx);
            }
            new_connectivity.push(C::from_refined_indices(&indices));
        }
    }

    let new_vertices = new_labels
        .iter()
        .map(|label| label.position(mesh.vertices()))
        .collect();
    Mesh::from_vertices_and_connectivity(new_vertices, new_connectivity)
}

/// Repeatedly applies uniform mesh refinement to the given mesh.
pub fn refine_uniformly_repeat<T, D, C>(mesh: &Mesh<T, D, C>, repeat_times: usize) -> Mesh<T, D, C>
where
    T: Real,
    D: DimName,
    C: RefineUniformly,
    DefaultAllocator: Allocator<T, D>,
{
    let mut mesh: Mesh<_, _, _> = mesh.clone();
    for _ in 0..repeat_times {
        mesh = refine_uniformly(&mesh);
    }
    mesh
}

/// Appends the vertex labels of the children of a single simplex with the given vertex indices.
///
/// Segments are split at their midpoint, triangles and tetrahedra follow the rules of
/// [`RefineUniformly`].
///
/// # Panics
///
/// Panics unless the simplex has 2, 3 or 4 vertices.
pub fn populate_simplex_children(vertex_indices: &[usize], labels: &mut Vec<RefinedVertex>) {
    match *vertex_indices {
        [a, b] => {
            let m = RefinedVertex::midpoint(a, b);
            labels.extend_from_slice(&[RefinedVertex::Vertex(a), m, m, RefinedVertex::Vertex(b)]);
        }
        [a, b, c] => Tri3d2Connectivity([a, b, c]).populate_children(labels),
        [a, b, c, d] => Tet4Connectivity([a, b, c, d]).populate_children(labels),
        _ => panic!("Only segments, triangles and tetrahedra can be subdivided"),
    }
}
