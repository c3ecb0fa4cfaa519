use crate::allocators::DimAllocator;
use crate::connectivity::{Connectivity, SimplexConnectivity, Tet4Connectivity, Tri3d2Connectivity};
use crate::element::SimplexElement;
use crate::{Error, Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, Scalar, U2, U3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod procedural;
pub mod refinement;

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a mesh topology.
///
/// Every mesh constructed through [`Mesh::from_vertices_and_connectivity`] receives a unique id.
/// Clones share the id of the original. Data derived from a mesh (level-set fields,
/// classifications, dof masks, deformations) carries the id so that stale data can be detected
/// after the mesh has been regenerated, for example by refinement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    pub fn fresh() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns an error if `found` does not match `self`.
    pub fn check(&self, found: MeshId) -> Result<(), Error> {
        if *self == found {
            Ok(())
        } else {
            Err(Error::StaleData { expected: *self, found })
        }
    }
}

impl Display for MeshId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Index-based data structure for conforming meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar, D, Connectivity>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    #[serde(skip, default = "MeshId::fresh")]
    id: MeshId,
    // serde's not able correctly determine the necessary trait bounds in this case,
    // so write our own
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    vertices: Vec<OPoint<T, D>>,
    #[serde(bound(
        serialize = "Connectivity: Serialize",
        deserialize = "Connectivity: Deserialize<'de>"
    ))]
    connectivity: Vec<Connectivity>,
}

pub type Mesh2d<T, Connectivity> = Mesh<T, U2, Connectivity>;
pub type Mesh3d<T, Connectivity> = Mesh<T, U3, Connectivity>;

pub type TriangleMesh2d<T> = Mesh2d<T, Tri3d2Connectivity>;
pub type Tet4Mesh<T> = Mesh3d<T, Tet4Connectivity>;

impl<T, D, Connectivity> Mesh<T, D, Connectivity>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity must only reference vertex indices that are in bounds. Users of the mesh
    /// are permitted to panic if they encounter invalid indices.
    pub fn from_vertices_and_connectivity(vertices: Vec<OPoint<T, D>>, connectivity: Vec<Connectivity>) -> Self {
        Self {
            id: MeshId::fresh(),
            vertices,
            connectivity,
        }
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: Connectivity,
    DefaultAllocator: Allocator<T, D>,
{
    /// The global vertex indices of the given element.
    pub fn vertices_of(&self, element_index: usize) -> Option<&[usize]> {
        self.connectivity
            .get(element_index)
            .map(|conn| conn.vertex_indices())
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Returns the geometric simplex of the given element.
    pub fn simplex_element(&self, element_index: usize) -> Option<SimplexElement<T, D>> {
        self.vertices_of(element_index).map(|indices| {
            let vertices = indices
                .iter()
                .map(|&idx| self.vertices[idx].clone())
                .collect();
            SimplexElement::from_vertices(vertices)
        })
    }

    /// Like [`simplex_element`](Self::simplex_element), but reports an out-of-bounds index as an
    /// error.
    pub fn checked_simplex_element(&self, element_index: usize) -> Result<SimplexElement<T, D>, Error> {
        self.simplex_element(element_index)
            .ok_or(Error::ElementOutOfBounds {
                index: element_index,
                num_elements: self.num_elements(),
            })
    }

    pub fn element_iter(&self) -> impl '_ + Iterator<Item = SimplexElement<T, D>> {
        (0..self.num_elements()).map(move |idx| {
            self.simplex_element(idx)
                .expect("Mesh is not allowed to contain elements with indices out of bounds.")
        })
    }

    /// Total measure (area or volume) of all elements in the mesh.
    pub fn measure(&self) -> T {
        self.element_iter()
            .map(|element| element.measure())
            .fold(T::zero(), |acc, m| acc + m)
    }
}

impl<T, D, C> Mesh<T, D, C>
where
    T: Scalar,
    D: DimName,
    C: Connectivity,
    DefaultAllocator: Allocator<T, D>,
{
    /// Returns a sorted list of vertices that are determined to be on the boundary.
    ///
    /// A vertex is considered to be a part of the boundary if it belongs to a boundary facet.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let facets = MeshFacets::from_mesh(self);
        let mut indices: Vec<_> = facets
            .boundary_facets()
            .flat_map(|facet| facets.vertices_of(facet).iter().copied())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// The elements on either side of a facet.
///
/// Interior facets have two neighbors, boundary facets only have one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FacetNeighbors {
    pub left: usize,
    pub right: Option<usize>,
}

/// The unique facets of a mesh together with their neighboring elements.
///
/// Facets are numbered in the order in which they are first encountered when traversing the
/// faces of the elements in order, so the numbering is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshFacets {
    mesh_id: MeshId,
    // Sorted vertex indices, `vertices_per_facet` per facet
    facet_vertices: Vec<usize>,
    vertices_per_facet: usize,
    neighbors: Vec<FacetNeighbors>,
}

impl MeshFacets {
    pub fn from_mesh<T, D, C>(mesh: &Mesh<T, D, C>) -> Self
    where
        T: Scalar,
        D: DimName,
        C: Connectivity,
        DefaultAllocator: Allocator<T, D>,
    {
        let mut facet_index_map: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
        let mut facet_vertices = Vec::new();
        let mut neighbors: Vec<FacetNeighbors> = Vec::new();
        let mut vertices_per_facet = 0;

        for (element_idx, conn) in mesh.connectivity().iter().enumerate() {
            for local_idx in 0..conn.num_faces() {
                let Some(mut key) = conn.face_vertices(local_idx) else {
                    continue;
                };
                key.sort_unstable();
                vertices_per_facet = key.len();

                if let Some(&facet_idx) = facet_index_map.get(&key) {
                    let entry = &mut neighbors[facet_idx];
                    debug_assert!(entry.right.is_none(), "Facet shared by more than two elements");
                    entry.right = Some(element_idx);
                } else {
                    facet_index_map.insert(key.clone(), neighbors.len());
                    facet_vertices.extend_from_slice(&key);
                    neighbors.push(FacetNeighbors {
                        left: element_idx,
                        right: None,
                    });
                }
            }
        }

        Self {
            mesh_id: mesh.id(),
            facet_vertices,
            vertices_per_facet,
            neighbors,
        }
    }

    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn num_facets(&self) -> usize {
        self.neighbors.len()
    }

    /// Sorted global vertex indices of the facet.
    ///
    /// # Panics
    ///
    /// Panics if the facet index is out of bounds.
    pub fn vertices_of(&self, facet: usize) -> &[usize] {
        let n = self.vertices_per_facet;
        &self.facet_vertices[n * facet..n * (facet + 1)]
    }

    pub fn neighbors_of(&self, facet: usize) -> Option<FacetNeighbors> {
        self.neighbors.get(facet).copied()
    }

    pub fn neighbors(&self) -> &[FacetNeighbors] {
        &self.neighbors
    }

    pub fn boundary_facets(&self) -> impl '_ + Iterator<Item = usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, n)| n.right.is_none())
            .map(|(idx, _)| idx)
    }
}
