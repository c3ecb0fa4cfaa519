use cutfem::classify::ElementTag;
use cutfem::cut::DomainType;
use cutfem::element::{reference_measure, SimplexElement};
use cutfem::integrate::{CutQuadratureStrategy, ElementCutInput};
use cutfem::quadrature::simplex::{simplex_measure, BarycentricRuleTable};
use cutfem::quadrature::subdivide::{subdivide_reference_simplex, SubdivisionCut};
use matrixcompare::assert_scalar_eq;
use nalgebra::{Point2, Point3, U2, U3};

#[test]
fn subdivided_triangle() {
    let vertices = subdivide_reference_simplex::<f64, U2>(0);
    assert_eq!(vertices.len(), 3);

    let vertices = subdivide_reference_simplex::<f64, U2>(2);
    assert_eq!(vertices.len(), 3 * 16);
    let total: f64 = vertices.chunks_exact(3).map(simplex_measure).sum();
    assert_scalar_eq!(total, reference_measure::<f64>(2), comp = abs, tol = 1e-14);
    for triangle in vertices.chunks_exact(3) {
        assert_scalar_eq!(simplex_measure(triangle), 2.0 / 16.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn subdivided_tetrahedron() {
    let vertices = subdivide_reference_simplex::<f64, U3>(1);
    assert_eq!(vertices.len(), 4 * 8);
    let total: f64 = vertices.chunks_exact(4).map(simplex_measure).sum();
    assert_scalar_eq!(total, 4.0 / 3.0, comp = abs, tol = 1e-14);
}

#[test]
fn subdivision_cut_of_reference_triangle() {
    let function = |x: &Point2<f64>| x.x - 0.1;
    let element = SimplexElement::<f64, U2>::reference();
    let values = [-1.1, 0.9, -1.1];
    let input = ElementCutInput {
        index: 0,
        tag: ElementTag::Cut,
        values: &values,
        element: &element,
    };
    let strategy = SubdivisionCut::new(&function, 2);
    assert_eq!(strategy.levels(), 2);
    let rules = BarycentricRuleTable::new();

    let neg = strategy
        .reference_rule(&input, DomainType::Neg, 1, &rules)
        .unwrap();
    let pos = strategy
        .reference_rule(&input, DomainType::Pos, 1, &rules)
        .unwrap();
    let interface = strategy
        .reference_rule(&input, DomainType::If, 1, &rules)
        .unwrap();

    // The positive part is the triangle (0.1, -1), (1, -1), (0.1, -0.1)
    assert_scalar_eq!(pos.weights.iter().sum::<f64>(), 0.405, comp = abs, tol = 1e-14);
    assert_scalar_eq!(neg.weights.iter().sum::<f64>(), 1.595, comp = abs, tol = 1e-14);
    assert_scalar_eq!(interface.weights.iter().sum::<f64>(), 0.9, comp = abs, tol = 1e-14);
    for (point, normal) in interface.points.iter().zip(&interface.data) {
        assert_scalar_eq!(point.x, 0.1, comp = abs, tol = 1e-14);
        assert_scalar_eq!(normal.x, 1.0, comp = abs, tol = 1e-14);
        assert_scalar_eq!(normal.y, 0.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn subdivision_cut_resolves_curved_interface_in_tetrahedron() {
    // A sphere through the reference tetrahedron, seen as a sign change at its vertices
    let function = |x: &Point3<f64>| (x - Point3::new(-1.0, -1.0, -1.0)).norm() - 1.0;
    let element = SimplexElement::<f64, U3>::reference();
    let values = [-1.0, 1.0, 1.0, 1.0];
    let input = ElementCutInput {
        index: 0,
        tag: ElementTag::Cut,
        values: &values,
        element: &element,
    };
    let rules = BarycentricRuleTable::new();
    let volume = |levels: usize| {
        SubdivisionCut::new(&function, levels)
            .reference_rule(&input, DomainType::Neg, 1, &rules)
            .unwrap()
            .weights
            .iter()
            .sum::<f64>()
    };

    // One eighth of the unit ball
    let exact = std::f64::consts::PI / 6.0;
    let coarse_error = (volume(1) - exact).abs();
    let fine_error = (volume(3) - exact).abs();
    assert!(fine_error < coarse_error);
    assert!(fine_error < 0.1 * exact);
}
