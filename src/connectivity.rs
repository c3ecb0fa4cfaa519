//! Index-based connectivity of simplicial cells.
use nalgebra::{DimName, U2, U3};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// The vertex indices of a single mesh cell.
pub trait Connectivity: Clone {
    fn vertex_indices(&self) -> &[usize];

    fn num_faces(&self) -> usize;

    /// The vertex indices of the local face with the given index.
    ///
    /// The vertex order follows the orientation induced by the cell.
    fn face_vertices(&self, index: usize) -> Option<Vec<usize>>;
}

/// Connectivity of a linear simplex whose vertices live in `D`-dimensional space.
///
/// Implementors guarantee that [`vertex_indices`](Connectivity::vertex_indices) returns exactly
/// `D + 1` indices, and that faces have exactly `D` vertices.
pub trait SimplexConnectivity<D: DimName>: Connectivity + Send + Sync {}

/// Local vertex indices of the faces of a triangle, traversed counter-clockwise.
const TRIANGLE_FACES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

/// Local vertex indices of the faces of a tetrahedron.
///
/// Faces are oriented with outward normals for positively oriented tetrahedra.
const TETRAHEDRON_FACES: [[usize; 3]; 4] = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];

macro_rules! simplex_connectivity {
    ($name:ident, $dim:ty, $num_vertices:literal, $faces:expr) => {
        impl Connectivity for $name {
            fn vertex_indices(&self) -> &[usize] {
                &self.0
            }

            fn num_faces(&self) -> usize {
                $faces.len()
            }

            fn face_vertices(&self, index: usize) -> Option<Vec<usize>> {
                $faces
                    .get(index)
                    .map(|face| face.iter().map(|&local| self.0[local]).collect())
            }
        }

        impl SimplexConnectivity<$dim> for $name {}

        impl Deref for $name {
            type Target = [usize; $num_vertices];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

/// Connectivity for a two-dimensional Tri3 element.
///
/// ```text
/// 2
/// |`\
/// |  `\
/// |    `\
/// 0------1
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Tri3d2Connectivity(pub [usize; 3]);

simplex_connectivity!(Tri3d2Connectivity, U2, 3, TRIANGLE_FACES);

/// Connectivity for a linear tetrahedron.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tet4Connectivity(pub [usize; 4]);

simplex_connectivity!(Tet4Connectivity, U3, 4, TETRAHEDRON_FACES);
