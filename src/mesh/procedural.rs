//! Basic procedural mesh generation routines.
use crate::connectivity::{Tet4Connectivity, Tri3d2Connectivity};
use crate::mesh::{Tet4Mesh, TriangleMesh2d};
use crate::Real;
use itertools::iproduct;
use nalgebra::{Matrix3, Point2, Point3, Vector3};

pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> TriangleMesh2d<T> {
    create_rectangular_uniform_tri_mesh_2d(
        &Point2::origin(),
        &Point2::new(T::one(), T::one()),
        [cells_per_dim, cells_per_dim],
    )
}

pub fn create_unit_box_uniform_tet_mesh_3d<T: Real>(cells_per_dim: usize) -> Tet4Mesh<T> {
    create_rectangular_uniform_tet_mesh_3d(
        &Point3::origin(),
        &Point3::new(T::one(), T::one(), T::one()),
        [cells_per_dim; 3],
    )
}

fn grid_coordinate<T: Real>(min: T, max: T, i: usize, cells: usize) -> T {
    let s = T::from_usize(i).expect("Must be able to fit usize in T")
        / T::from_usize(cells).expect("Must be able to fit usize in T");
    min + (max - min) * s
}

/// Triangulates the axis-aligned rectangle `[min, max]` with `cells[0] x cells[1]` squares, each
/// split into two counter-clockwise triangles along the same diagonal.
pub fn create_rectangular_uniform_tri_mesh_2d<T: Real>(
    min: &Point2<T>,
    max: &Point2<T>,
    cells: [usize; 2],
) -> TriangleMesh2d<T> {
    let [nx, ny] = cells;
    if nx == 0 || ny == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let vertices = iproduct!(0..=ny, 0..=nx)
        .map(|(j, i)| {
            Point2::new(
                grid_coordinate(min.x, max.x, i, nx),
                grid_coordinate(min.y, max.y, j, ny),
            )
        })
        .collect();

    let to_global_vertex_index = |i, j| (nx + 1) * j + i;
    let mut connectivity = Vec::with_capacity(2 * nx * ny);
    for (j, i) in iproduct!(0..ny, 0..nx) {
        let v00 = to_global_vertex_index(i, j);
        let v10 = to_global_vertex_index(i + 1, j);
        let v01 = to_global_vertex_index(i, j + 1);
        let v11 = to_global_vertex_index(i + 1, j + 1);
        connectivity.push(Tri3d2Connectivity([v00, v10, v11]));
        connectivity.push(Tri3d2Connectivity([v00, v11, v01]));
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// Tetrahedralizes the axis-aligned box `[min, max]` with `cells[0] x cells[1] x cells[2]`
/// cubes.
///
/// Every cube is split into six tetrahedra sharing the main diagonal of the cube (Kuhn
/// triangulation). All cubes use the same split, so the mesh is conforming. The tetrahedra are
/// positively oriented.
pub fn create_rectangular_uniform_tet_mesh_3d<T: Real>(
    min: &Point3<T>,
    max: &Point3<T>,
    cells: [usize; 3],
) -> Tet4Mesh<T> {
    let [nx, ny, nz] = cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return Tet4Mesh::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let vertices: Vec<_> = iproduct!(0..=nz, 0..=ny, 0..=nx)
        .map(|(k, j, i)| {
            Point3::new(
                grid_coordinate(min.x, max.x, i, nx),
                grid_coordinate(min.y, max.y, j, ny),
                grid_coordinate(min.z, max.z, k, nz),
            )
        })
        .collect();

    let to_global_vertex_index = |i: usize, j: usize, k: usize| (nx + 1) * (ny + 1) * k + (nx + 1) * j + i;
    let unit_offsets = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];
    let axis_permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    let mut connectivity = Vec::with_capacity(6 * nx * ny * nz);
    for (k, j, i) in iproduct!(0..nz, 0..ny, 0..nx) {
        for [p0, p1, _] in axis_permutations {
            // Walk from the lower corner to the upper corner along the axes p0, p1, p2
            let mut corner = [i, j, k];
            let mut tet = [0; 4];
            tet[0] = to_global_vertex_index(corner[0], corner[1], corner[2]);
            for (step, axis) in [p0, p1].into_iter().enumerate() {
                for d in 0..3 {
                    corner[d] += unit_offsets[axis][d];
                }
                tet[step + 1] = to_global_vertex_index(corner[0], corner[1], corner[2]);
            }
            tet[3] = to_global_vertex_index(i + 1, j + 1, k + 1);

            if signed_volume_sign(&vertices, &tet) < T::zero() {
                tet.swap(1, 2);
            }
            connectivity.push(Tet4Connectivity(tet));
        }
    }

    Tet4Mesh::from_vertices_and_connectivity(vertices, connectivity)
}

fn signed_volume_sign<T: Real>(vertices: &[Point3<T>], tet: &[usize; 4]) -> T {
    let edge = |i: usize| -> Vector3<T> { vertices[tet[i]] - vertices[tet[0]] };
    Matrix3::from_columns(&[edge(1), edge(2), edge(3)]).determinant()
}
