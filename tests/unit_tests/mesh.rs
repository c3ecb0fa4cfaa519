use cutfem::connectivity::{Connectivity, Tri3d2Connectivity};
use cutfem::mesh::procedural::{
    create_rectangular_uniform_tet_mesh_3d, create_unit_box_uniform_tet_mesh_3d, create_unit_square_uniform_tri_mesh_2d,
};
use cutfem::mesh::{MeshFacets, TriangleMesh2d};
use cutfem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::Point3;

#[test]
fn unit_square_tri_mesh_has_expected_size() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    assert_eq!(mesh.vertices().len(), 9);
    assert_eq!(mesh.num_elements(), 8);
    assert_scalar_eq!(mesh.measure(), 1.0, comp = abs, tol = 1e-14);

    // All triangles are counter-clockwise
    for element in mesh.element_iter() {
        assert!(element.jacobian().determinant() > 0.0);
    }
}

#[test]
fn empty_rectangular_mesh() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(0);
    assert!(mesh.vertices().is_empty());
    assert_eq!(mesh.num_elements(), 0);
}

#[test]
fn unit_box_tet_mesh_has_expected_size() {
    let mesh = create_unit_box_uniform_tet_mesh_3d::<f64>(2);
    assert_eq!(mesh.vertices().len(), 27);
    assert_eq!(mesh.num_elements(), 48);
    assert_scalar_eq!(mesh.measure(), 1.0, comp = abs, tol = 1e-14);
    for element in mesh.element_iter() {
        assert!(element.jacobian().determinant() > 0.0);
    }
}

#[test]
fn rectangular_tet_mesh_measure() {
    let mesh = create_rectangular_uniform_tet_mesh_3d(&Point3::new(-1.0, 0.0, 0.0), &Point3::new(1.0, 3.0, 0.5), [2, 3, 1]);
    assert_eq!(mesh.num_elements(), 6 * 6);
    assert_scalar_eq!(mesh.measure(), 3.0, comp = abs, tol = 1e-13);
}

#[test]
fn clones_share_mesh_id_and_new_meshes_do_not() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let clone = mesh.clone();
    let other = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    assert_eq!(mesh.id(), clone.id());
    assert_ne!(mesh.id(), other.id());
    assert!(mesh.id().check(other.id()).is_err());
}

#[test]
fn vertices_of_and_simplex_element() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    assert_eq!(mesh.vertices_of(0), Some(&[0, 1, 3][..]));
    assert_eq!(mesh.vertices_of(1), Some(&[0, 3, 2][..]));
    assert_eq!(mesh.vertices_of(2), None);
    assert!(mesh.simplex_element(2).is_none());

    let element = mesh.simplex_element(0).unwrap();
    assert_scalar_eq!(element.measure(), 0.5, comp = abs, tol = 1e-15);
    assert_scalar_eq!(element.diameter(), 2.0f64.sqrt(), comp = abs, tol = 1e-15);
}

#[test]
fn checked_simplex_element_reports_out_of_bounds() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let element = mesh.checked_simplex_element(1).unwrap();
    assert_eq!(Some(element), mesh.simplex_element(1));
    assert!(matches!(
        mesh.checked_simplex_element(2),
        Err(Error::ElementOutOfBounds {
            index: 2,
            num_elements: 2
        })
    ));

    // The diameter of the cube's Kuhn tetrahedra is the main diagonal
    let cube = create_unit_box_uniform_tet_mesh_3d::<f64>(1);
    let tet = cube.checked_simplex_element(0).unwrap();
    assert_scalar_eq!(tet.diameter(), 3.0f64.sqrt(), comp = abs, tol = 1e-15);
    assert!(matches!(
        cube.checked_simplex_element(6),
        Err(Error::ElementOutOfBounds { index: 6, .. })
    ));
}

#[test]
fn find_boundary_vertices_of_square() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2);
    assert_eq!(mesh.find_boundary_vertices(), vec![0, 1, 2, 3, 5, 6, 7, 8]);
}

#[test]
fn mesh_facets_of_two_triangles() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1);
    let facets = MeshFacets::from_mesh(&mesh);
    assert_eq!(facets.mesh_id(), mesh.id());
    assert_eq!(facets.num_facets(), 5);
    assert_eq!(facets.boundary_facets().count(), 4);

    let interior: Vec<_> = (0..facets.num_facets())
        .filter(|&f| facets.neighbors_of(f).unwrap().right.is_some())
        .collect();
    assert_eq!(interior.len(), 1);
    let diagonal = interior[0];
    assert_eq!(facets.vertices_of(diagonal), &[0, 3]);
    let neighbors = facets.neighbors_of(diagonal).unwrap();
    assert_eq!(neighbors.left, 0);
    assert_eq!(neighbors.right, Some(1));
    assert!(facets.neighbors_of(5).is_none());
}

#[test]
fn mesh_facets_of_tet_mesh() {
    let mesh = create_unit_box_uniform_tet_mesh_3d::<f64>(1);
    let facets = MeshFacets::from_mesh(&mesh);
    // 6 tetrahedra with 4 faces each, 12 boundary triangles on the cube surface
    let num_boundary = facets.boundary_facets().count();
    assert_eq!(num_boundary, 12);
    assert_eq!(2 * facets.num_facets() - num_boundary, 24);
}

#[test]
fn facets_of_custom_mesh() {
    // Two triangles sharing the edge (1, 2)
    let vertices = vec![
        [0.0, 0.0].into(),
        [1.0, 0.0].into(),
        [0.0, 1.0].into(),
        [1.0, 1.0].into(),
    ];
    let connectivity = vec![Tri3d2Connectivity([0, 1, 2]), Tri3d2Connectivity([1, 3, 2])];
    let mesh = TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity);
    let facets = MeshFacets::from_mesh(&mesh);
    assert_eq!(facets.num_facets(), 5);
    let shared: Vec<_> = (0..facets.num_facets())
        .filter(|&f| facets.vertices_of(f) == [1, 2])
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(facets.neighbors_of(shared[0]).unwrap().right, Some(1));
    assert_eq!(mesh.connectivity()[1].vertex_indices(), &[1, 3, 2]);
}
