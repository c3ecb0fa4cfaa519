use crate::unit_tests::{prepare, square_mesh};
use cutfem::classify::{classify_elements, ElementTag, TagSet};
use cutfem::cut::DomainType;
use cutfem::element::ElementMap;
use cutfem::integrate::{IntegrationSettings, LevelSetIntegrator, LinearCut};
use cutfem::levelset::{interpolate_levelset, Circle, Plane};
use cutfem::mesh::procedural::{create_unit_box_uniform_tet_mesh_3d, create_unit_square_uniform_tri_mesh_2d};
use cutfem::mesh::refinement::refine_uniformly;
use cutfem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Point3, Vector2, Vector3};

#[test]
fn uncut_mesh_integrates_monomials_exactly() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3);
    let (field, classification) = prepare(&mesh, &|_: &Point2<f64>| -1.0);
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();

    for order in 0..=4 {
        for a in 0..=order {
            let b = order - a;
            let f = |x: &Point2<f64>| x.x.powi(a as i32) * x.y.powi(b as i32);
            let expected = 1.0 / ((a + 1) * (b + 1)) as f64;
            let neg = integrator.integrate(DomainType::Neg, order, f).unwrap();
            assert_scalar_eq!(neg, expected, comp = abs, tol = 1e-13);
            assert_eq!(integrator.integrate(DomainType::Pos, order, f).unwrap(), 0.0);
            assert_eq!(integrator.integrate(DomainType::If, order, f).unwrap(), 0.0);
        }
    }
    // No cut elements, nothing to cache
    assert!(integrator.cache().is_empty());
}

#[test]
fn vertical_line_splits_unit_square() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(4);
    let plane = Plane::new(Vector2::new(1.0, 0.0), 0.3);
    let (field, classification) = prepare(&mesh, &plane);
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();

    assert_scalar_eq!(integrator.measure(DomainType::Neg).unwrap(), 0.3, comp = abs, tol = 1e-13);
    assert_scalar_eq!(integrator.measure(DomainType::Pos).unwrap(), 0.7, comp = abs, tol = 1e-13);
    assert_scalar_eq!(integrator.measure(DomainType::If).unwrap(), 1.0, comp = abs, tol = 1e-13);

    let neg_x = integrator.integrate(DomainType::Neg, 1, |x| x.x).unwrap();
    assert_scalar_eq!(neg_x, 0.045, comp = abs, tol = 1e-13);
    let neg_xy2 = integrator.integrate(DomainType::Neg, 3, |x| x.x * x.y * x.y).unwrap();
    assert_scalar_eq!(neg_xy2, 0.045 / 3.0, comp = abs, tol = 1e-13);
    let if_y = integrator.integrate(DomainType::If, 1, |x| x.y).unwrap();
    assert_scalar_eq!(if_y, 0.5, comp = abs, tol = 1e-13);

    // The reference rules of all cut elements have been cached once per domain and strength
    let num_cut = classification.count(ElementTag::Cut);
    assert_eq!(num_cut, 8);
    // Six (domain, strength) pairs were requested above
    assert_eq!(integrator.cache().len(), 6 * num_cut);
}

#[test]
fn interface_quadrature_carries_physical_points_and_normals() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(4);
    let plane = Plane::new(Vector2::new(1.0, 0.0), 0.3);
    let (field, classification) = prepare(&mesh, &plane);
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();

    for element in classification.elements_in(TagSet::IF) {
        let quadrature = integrator
            .element_quadrature(element, DomainType::If, 2)
            .unwrap();
        assert!(!quadrature.weights.is_empty());
        let geometry = mesh.simplex_element(element).unwrap();
        for ((w, xi), data) in quadrature
            .weights
            .iter()
            .zip(&quadrature.points)
            .zip(&quadrature.data)
        {
            assert!(*w > 0.0);
            assert_scalar_eq!(data.position.x, 0.3, comp = abs, tol = 1e-14);
            let mapped = geometry.map_reference_coords(xi);
            assert_scalar_eq!(mapped.y, data.position.y, comp = abs, tol = 1e-14);
            assert_scalar_eq!(data.normal.x, 1.0, comp = abs, tol = 1e-14);
            assert_scalar_eq!(data.normal.y, 0.0, comp = abs, tol = 1e-14);
        }

        let volume = integrator
            .element_quadrature(element, DomainType::Neg, 2)
            .unwrap();
        assert!(volume.data.iter().all(|d| d.normal == Vector2::zeros()));
        assert!(volume.data.iter().all(|d| d.position.x <= 0.3 + 1e-14));
    }
}

#[test]
fn negative_and_positive_parts_sum_to_element_measure() {
    let mesh = square_mesh(9);
    let (field, classification) = prepare(&mesh, &Circle::new(Point2::new(0.05, -0.1), 1.0));
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();
    for element in 0..mesh.num_elements() {
        let neg = integrator
            .integrate_element(element, DomainType::Neg, 0, |_| 1.0)
            .unwrap();
        let pos = integrator
            .integrate_element(element, DomainType::Pos, 0, |_| 1.0)
            .unwrap();
        let measure = integrator.element_measure(element).unwrap();
        assert_scalar_eq!(neg + pos, measure, comp = abs, tol = 1e-14);
        if classification.tag(element) == Some(ElementTag::Cut) {
            assert!(neg > 0.0 && pos > 0.0);
        }
    }
}

#[test]
fn plane_cut_of_unit_cube() {
    let mesh = create_unit_box_uniform_tet_mesh_3d::<f64>(3);
    let plane = Plane::new(Vector3::new(1.0, 1.0, 1.0), 1.2);
    let field = interpolate_levelset(&mesh, &plane).unwrap();
    let classification = classify_elements(&mesh, &field).unwrap();
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();

    // Volume of the corner {x + y + z < s} of the unit cube for 1 < s < 2
    let s: f64 = 1.2;
    let expected_neg = s.powi(3) / 6.0 - 3.0 * (s - 1.0).powi(3) / 6.0;
    assert_scalar_eq!(integrator.measure(DomainType::Neg).unwrap(), expected_neg, comp = abs, tol = 1e-13);
    assert_scalar_eq!(
        integrator.measure(DomainType::Pos).unwrap(),
        1.0 - expected_neg,
        comp = abs,
        tol = 1e-13
    );
    // The projection of the interface onto the xy-plane is {0.2 <= x + y <= 1.2}
    let expected_if = 3.0f64.sqrt() * (1.0 - 0.8 * 0.8 / 2.0 - 0.2 * 0.2 / 2.0);
    assert_scalar_eq!(integrator.measure(DomainType::If).unwrap(), expected_if, comp = abs, tol = 1e-13);
}

#[test]
fn sphere_measure_on_tet_mesh() {
    let mesh = create_unit_box_uniform_tet_mesh_3d::<f64>(12);
    let sphere = cutfem::levelset::Sphere::new(Point3::new(0.5, 0.5, 0.5), 0.35);
    let field = interpolate_levelset(&mesh, &sphere).unwrap();
    let classification = classify_elements(&mesh, &field).unwrap();
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();

    let r: f64 = 0.35;
    let volume = integrator.measure(DomainType::Neg).unwrap();
    let area = integrator.measure(DomainType::If).unwrap();
    let exact_volume = 4.0 / 3.0 * std::f64::consts::PI * r.powi(3);
    let exact_area = 4.0 * std::f64::consts::PI * r.powi(2);
    assert!(((volume - exact_volume) / exact_volume).abs() < 0.1);
    assert!(((area - exact_area) / exact_area).abs() < 0.1);
    // The P1 interpolant of a convex function lies above it, so the negative region shrinks
    assert!(volume < exact_volume);
}

#[test]
fn integrator_rejects_stale_inputs() {
    let mesh = square_mesh(2);
    let circle = Circle::centered_at_origin(1.0);
    let (field, classification) = prepare(&mesh, &circle);

    let refined = refine_uniformly(&mesh);
    let (refined_field, refined_classification) = prepare(&refined, &circle);

    assert!(matches!(
        LevelSetIntegrator::new(&mesh, &refined_field, &classification),
        Err(Error::StaleData { .. })
    ));
    assert!(matches!(
        LevelSetIntegrator::new(&mesh, &field, &refined_classification),
        Err(Error::StaleData { .. })
    ));
    assert!(LevelSetIntegrator::new(&refined, &refined_field, &refined_classification).is_ok());
}

#[test]
fn element_out_of_bounds() {
    let mesh = square_mesh(2);
    let (field, classification) = prepare(&mesh, &Circle::centered_at_origin(1.0));
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();
    let result = integrator.integrate_element(8, DomainType::Neg, 1, |_| 1.0);
    assert!(matches!(
        result,
        Err(Error::ElementOutOfBounds {
            index: 8,
            num_elements: 8
        })
    ));
    assert!(integrator.element_measure(100).is_err());
}

#[test]
fn forced_integration_order() {
    let mesh = square_mesh(4);
    let (field, classification) = prepare(&mesh, &Circle::centered_at_origin(1.0));
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification).unwrap();
    assert_eq!(integrator.quadrature_strength(0, 3), 3);

    let integrator = integrator.with_force_intorder(Some(7));
    assert_eq!(integrator.quadrature_strength(0, 3), 7);
    assert_eq!(integrator.quadrature_strength(5, 0), 7);

    // Forcing a higher order does not change the measure of polygonal domains
    let forced = integrator.measure(DomainType::Neg).unwrap();
    let default = LevelSetIntegrator::new(&mesh, &field, &classification)
        .unwrap()
        .measure(DomainType::Neg)
        .unwrap();
    assert_scalar_eq!(forced, default, comp = abs, tol = 1e-13);
}

#[test]
fn unavailable_quadrature_strength_is_an_error() {
    let mesh = square_mesh(2);
    let (field, classification) = prepare(&mesh, &Circle::centered_at_origin(1.0));
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification)
        .unwrap()
        .with_force_intorder(Some(10_000));
    assert!(matches!(integrator.measure(DomainType::Neg), Err(Error::Quadrature(_))));
}

#[test]
fn subdivision_strategy_is_exact_for_planes() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3);
    let plane = Plane::new(Vector2::new(1.0, 1.0), 0.8);
    let (field, classification) = prepare(&mesh, &plane);
    let settings = IntegrationSettings {
        force_intorder: None,
        subdivlvl: Some(2),
    };
    let integrator = LevelSetIntegrator::new(&mesh, &field, &classification)
        .unwrap()
        .with_settings(&settings, &plane);

    assert_scalar_eq!(integrator.measure(DomainType::Neg).unwrap(), 0.32, comp = abs, tol = 1e-13);
    assert_scalar_eq!(
        integrator.measure(DomainType::If).unwrap(),
        0.8 * 2.0f64.sqrt(),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn subdivision_strategy_improves_circle() {
    let mesh = square_mesh(6);
    let circle = Circle::centered_at_origin(1.0);
    let (field, classification) = prepare(&mesh, &circle);
    let linear = LevelSetIntegrator::new(&mesh, &field, &classification)
        .unwrap()
        .with_strategy(LinearCut);
    let subdivided = LevelSetIntegrator::new(&mesh, &field, &classification)
        .unwrap()
        .with_settings(
            &IntegrationSettings {
                force_intorder: None,
                subdivlvl: Some(3),
            },
            &circle,
        );

    let pi = std::f64::consts::PI;
    let linear_error = (linear.measure(DomainType::Neg).unwrap() - pi).abs();
    let subdivided_error = (subdivided.measure(DomainType::Neg).unwrap() - pi).abs();
    assert!(subdivided_error < linear_error);
}
