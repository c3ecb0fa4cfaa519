use cutfem::cut::{cut_rule, decompose_simplex, interface_measure_factor, CutRule, DomainType};
use cutfem::element::{reference_measure, reference_vertices, ElementMap, SimplexElement};
use cutfem::proptest::{cut_levelset_values, levelset_values, nondegenerate_tetrahedron, nondegenerate_triangle};
use cutfem::quadrature::simplex::{simplex_measure, BarycentricRule};
use cutfem::Error;
use matrixcompare::assert_scalar_eq;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Matrix2, Point2, Point3, Vector2, U2, U3};
use proptest::prelude::*;

fn rules(dim: usize, strength: usize) -> (BarycentricRule<f64>, BarycentricRule<f64>) {
    (
        BarycentricRule::new(dim, strength).unwrap(),
        BarycentricRule::new(dim - 1, strength).unwrap(),
    )
}

fn reference_cut_rule<D>(values: &[f64], domain: DomainType, strength: usize) -> CutRule<f64, D>
where
    D: cutfem::SmallDim,
    DefaultAllocator: cutfem::allocators::DimAllocator<f64, D>,
{
    let (volume_rule, facet_rule) = rules(D::dim(), strength);
    cut_rule(&reference_vertices::<f64, D>(), values, domain, &volume_rule, &facet_rule)
}

fn weight_sum<D>(rule: &CutRule<f64, D>) -> f64
where
    D: DimName,
    DefaultAllocator: Allocator<f64, D>,
{
    rule.weights.iter().sum()
}

fn integrate_2d(rule: &CutRule<f64, U2>, f: impl Fn(&Point2<f64>) -> f64) -> f64 {
    rule.weights
        .iter()
        .zip(&rule.points)
        .map(|(w, p)| w * f(p))
        .sum()
}

#[test]
fn domain_type_tokens() {
    assert_eq!("NEG".parse::<DomainType>().unwrap(), DomainType::Neg);
    assert_eq!("pos".parse::<DomainType>().unwrap(), DomainType::Pos);
    assert_eq!("If".parse::<DomainType>().unwrap(), DomainType::If);
    assert!(matches!("volume".parse::<DomainType>(), Err(Error::InvalidDomainType(token)) if token == "volume"));
    assert!(matches!("".parse::<DomainType>(), Err(Error::InvalidDomainType(_))));
    for domain in DomainType::ALL {
        assert_eq!(domain.to_string().parse::<DomainType>().unwrap(), domain);
    }
}

#[test]
fn domain_type_serde() {
    assert_eq!(serde_json::to_string(&DomainType::If).unwrap(), "\"IF\"");
    assert_eq!(serde_json::from_str::<DomainType>("\"neg\"").unwrap(), DomainType::Neg);
    assert!(serde_json::from_str::<DomainType>("\"BOTH\"").is_err());
}

#[test]
fn uncut_triangle_is_not_decomposed() {
    let vertices = reference_vertices::<f64, U2>();
    let decomposition = decompose_simplex(&vertices, &[-1.0, -2.0, 0.0]);
    assert_eq!(decomposition.negative_simplices().count(), 1);
    assert_eq!(decomposition.positive_simplices().count(), 0);
    assert_eq!(decomposition.interface_facets().count(), 0);
    assert!(decomposition.normal().is_none());

    // An element touching the interface with a whole edge has no interface part
    let rule = reference_cut_rule::<U2>(&[0.0, 0.0, -1.0], DomainType::If, 2);
    assert!(rule.weights.is_empty());
    let rule = reference_cut_rule::<U2>(&[0.0, 0.0, -1.0], DomainType::Neg, 2);
    assert_scalar_eq!(weight_sum(&rule), 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn triangle_decomposition_sizes() {
    let vertices = reference_vertices::<f64, U2>();
    let decomposition = decompose_simplex(&vertices, &[-1.0, 1.0, 1.0]);
    assert_eq!(decomposition.negative_simplices().count(), 1);
    assert_eq!(decomposition.positive_simplices().count(), 2);
    assert_eq!(decomposition.interface_facets().count(), 1);

    let decomposition = decompose_simplex(&vertices, &[-1.0, -1.0, 1.0]);
    assert_eq!(decomposition.negative_simplices().count(), 2);
    assert_eq!(decomposition.positive_simplices().count(), 1);
}

#[test]
fn triangle_cut_by_vertical_line() {
    // phi(xi) = xi_x on the reference triangle, the interface is the segment from (0, -1) to
    // (0, 0). The positive part is the triangle (0, -1), (1, -1), (0, 0).
    let values = [-1.0, 1.0, -1.0];
    let neg = reference_cut_rule::<U2>(&values, DomainType::Neg, 2);
    let pos = reference_cut_rule::<U2>(&values, DomainType::Pos, 2);
    let interface = reference_cut_rule::<U2>(&values, DomainType::If, 2);

    assert_scalar_eq!(weight_sum(&neg), 1.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&pos), 0.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&interface), 1.0, comp = abs, tol = 1e-14);

    // Exact moments of the positive triangle
    assert_scalar_eq!(integrate_2d(&pos, |p| p.x), 1.0 / 6.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(integrate_2d(&pos, |p| p.y), -1.0 / 3.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(integrate_2d(&pos, |p| p.x * p.x), 1.0 / 12.0, comp = abs, tol = 1e-14);

    // Interface points lie on the line and carry the normal
    for (p, normal) in interface.points.iter().zip(&interface.data) {
        assert_scalar_eq!(p.x, 0.0, comp = abs, tol = 1e-15);
        assert!(p.y >= -1.0 && p.y <= 0.0);
        assert_scalar_eq!(normal.x, 1.0, comp = abs, tol = 1e-15);
        assert_scalar_eq!(normal.y, 0.0, comp = abs, tol = 1e-15);
    }
    // Volume rules carry zero data
    assert!(neg.data.iter().all(|d| d.norm() == 0.0));
}

#[test]
fn tetrahedron_cut_one_vertex_isolated() {
    // phi = xi_x + 0.5: vertex 1 is positive, the others negative
    let values = [-0.5, 1.5, -0.5, -0.5];
    let vertices = reference_vertices::<f64, U3>();
    let decomposition = decompose_simplex(&vertices, &values);
    assert_eq!(decomposition.positive_simplices().count(), 1);
    assert_eq!(decomposition.negative_simplices().count(), 3);
    assert_eq!(decomposition.interface_facets().count(), 1);

    let neg = reference_cut_rule::<U3>(&values, DomainType::Neg, 2);
    let pos = reference_cut_rule::<U3>(&values, DomainType::Pos, 2);
    let interface = reference_cut_rule::<U3>(&values, DomainType::If, 2);
    let pos_volume = 1.5f64.powi(3) / 6.0;
    assert_scalar_eq!(weight_sum(&pos), pos_volume, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&neg), 4.0 / 3.0 - pos_volume, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&interface), 1.125, comp = abs, tol = 1e-14);
}

#[test]
fn tetrahedron_cut_two_by_two() {
    // phi = xi_x + xi_y + 1
    let values = [-1.0, 1.0, 1.0, -1.0];
    let vertices = reference_vertices::<f64, U3>();
    let decomposition = decompose_simplex(&vertices, &values);
    assert_eq!(decomposition.positive_simplices().count(), 3);
    assert_eq!(decomposition.negative_simplices().count(), 3);
    assert_eq!(decomposition.interface_facets().count(), 2);

    let neg = reference_cut_rule::<U3>(&values, DomainType::Neg, 1);
    let pos = reference_cut_rule::<U3>(&values, DomainType::Pos, 1);
    let interface = reference_cut_rule::<U3>(&values, DomainType::If, 1);
    assert_scalar_eq!(weight_sum(&neg), 2.0 / 3.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&pos), 2.0 / 3.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&interface), 2.0f64.sqrt(), comp = abs, tol = 1e-14);

    let expected_normal = 0.5f64.sqrt();
    for normal in &interface.data {
        assert_scalar_eq!(normal.x, expected_normal, comp = abs, tol = 1e-14);
        assert_scalar_eq!(normal.y, expected_normal, comp = abs, tol = 1e-14);
        assert_scalar_eq!(normal.z, 0.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn degenerate_pieces_are_discarded() {
    let values = [-1e-300, 1.0, 1.0];
    let neg = reference_cut_rule::<U2>(&values, DomainType::Neg, 2);
    let pos = reference_cut_rule::<U2>(&values, DomainType::Pos, 2);
    let interface = reference_cut_rule::<U2>(&values, DomainType::If, 2);
    assert!(neg.weights.is_empty());
    assert!(interface.weights.is_empty());
    assert!(pos.weights.iter().all(|w| w.is_finite() && *w >= 0.0));
    assert_scalar_eq!(weight_sum(&pos), 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn interface_measure_factor_of_affine_maps() {
    let normal = Vector2::new(1.0, 0.0);
    assert_scalar_eq!(interface_measure_factor(&Matrix2::identity(), &normal), 1.0, comp = abs, tol = 1e-15);

    // Stretching along the tangent scales interface length, stretching along the normal does not
    let stretch_y = Matrix2::new(1.0, 0.0, 0.0, 3.0);
    assert_scalar_eq!(interface_measure_factor(&stretch_y, &normal), 3.0, comp = abs, tol = 1e-14);
    let stretch_x = Matrix2::new(3.0, 0.0, 0.0, 1.0);
    assert_scalar_eq!(interface_measure_factor(&stretch_x, &normal), 1.0, comp = abs, tol = 1e-14);

    assert_eq!(interface_measure_factor(&Matrix2::zeros(), &normal), 0.0);
}

#[test]
fn physical_triangle_cut_matches_analytic_moments() {
    // The triangle (0, 0), (2, 0), (0, 2) cut by x + y = 1: the negative part is the triangle
    // (0, 0), (1, 0), (0, 1)
    let vertices = vec![Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(0.0, 2.0)];
    let values = [-1.0, 1.0, 1.0];
    let (volume_rule, facet_rule) = rules(2, 3);
    let neg = cut_rule(&vertices, &values, DomainType::Neg, &volume_rule, &facet_rule);
    let pos = cut_rule(&vertices, &values, DomainType::Pos, &volume_rule, &facet_rule);
    let interface = cut_rule(&vertices, &values, DomainType::If, &volume_rule, &facet_rule);

    assert_scalar_eq!(weight_sum(&neg), 0.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&pos), 1.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(weight_sum(&interface), 2.0f64.sqrt(), comp = abs, tol = 1e-14);
    // int_{x + y < 1} x^2 y dA = 2! 1! / 5! = 1 / 60
    assert_scalar_eq!(integrate_2d(&neg, |p| p.x * p.x * p.y), 1.0 / 60.0, comp = abs, tol = 1e-14);
    // Scaling the negative part by 2 gives the whole triangle, hence the factor 2^5
    let total = integrate_2d(&neg, |p| p.x * p.x * p.y) + integrate_2d(&pos, |p| p.x * p.x * p.y);
    assert_scalar_eq!(total, 32.0 / 60.0, comp = abs, tol = 1e-13);
    // int_{x + y = 1} x ds = sqrt(2) / 2
    assert_scalar_eq!(integrate_2d(&interface, |p| p.x), 0.5 * 2.0f64.sqrt(), comp = abs, tol = 1e-14);
}

#[test]
fn simplex_measure_of_embedded_simplices() {
    let segment = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 2.0)];
    assert_scalar_eq!(simplex_measure(&segment), 3.0, comp = abs, tol = 1e-14);
    let triangle = [Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 1.0, 1.0)];
    assert_scalar_eq!(simplex_measure(&triangle), 0.5, comp = abs, tol = 1e-14);
    assert_scalar_eq!(simplex_measure(&reference_vertices::<f64, U3>()), 4.0 / 3.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(reference_measure::<f64>(3), 4.0 / 3.0, comp = abs, tol = 1e-15);
}

fn check_partition_of_element<D>(element: &SimplexElement<f64, D>, values: &[f64]) -> Result<(), TestCaseError>
where
    D: cutfem::SmallDim,
    DefaultAllocator: cutfem::allocators::DimAllocator<f64, D>,
{
    let (volume_rule, facet_rule) = rules(D::dim(), 1);
    let vertices = element.vertices();
    let neg = cut_rule(vertices, values, DomainType::Neg, &volume_rule, &facet_rule);
    let pos = cut_rule(vertices, values, DomainType::Pos, &volume_rule, &facet_rule);
    let measure = element.measure();
    for rule in [&neg, &pos] {
        prop_assert!(rule.weights.iter().all(|w| w.is_finite() && *w >= 0.0));
    }
    let sum = weight_sum(&neg) + weight_sum(&pos);
    prop_assert!((sum - measure).abs() <= 1e-10 * measure, "sum = {}, measure = {}", sum, measure);

    // The interface measured on the reference element and mapped with Nanson's formula agrees
    // with the interface cut from the physical element
    let physical = cut_rule(vertices, values, DomainType::If, &volume_rule, &facet_rule);
    let reference = cut_rule(&reference_vertices::<f64, D>(), values, DomainType::If, &volume_rule, &facet_rule);
    let jacobian = element.reference_jacobian(&reference_vertices::<f64, D>()[0]);
    let mapped: f64 = reference
        .weights
        .iter()
        .zip(&reference.data)
        .map(|(w, n)| w * interface_measure_factor(&jacobian, n))
        .sum();
    let scale = element.diameter().powi(D::dim() as i32 - 1);
    prop_assert!((mapped - weight_sum(&physical)).abs() <= 1e-8 * scale);
    Ok(())
}

proptest! {
    #[test]
    fn reference_triangle_parts_sum_to_element(values in levelset_values(3)) {
        let neg = reference_cut_rule::<U2>(&values, DomainType::Neg, 1);
        let pos = reference_cut_rule::<U2>(&values, DomainType::Pos, 1);
        prop_assert!((weight_sum(&neg) + weight_sum(&pos) - 2.0).abs() <= 1e-12);
    }

    #[test]
    fn reference_tetrahedron_parts_sum_to_element(values in levelset_values(4)) {
        let neg = reference_cut_rule::<U3>(&values, DomainType::Neg, 1);
        let pos = reference_cut_rule::<U3>(&values, DomainType::Pos, 1);
        prop_assert!((weight_sum(&neg) + weight_sum(&pos) - 4.0 / 3.0).abs() <= 1e-12);
    }

    #[test]
    fn physical_triangle_partition(element in nondegenerate_triangle(), values in cut_levelset_values(3)) {
        check_partition_of_element(&element, &values)?;
    }

    #[test]
    fn physical_tetrahedron_partition(element in nondegenerate_tetrahedron(), values in cut_levelset_values(4)) {
        check_partition_of_element(&element, &values)?;
    }
}

#[test]
fn degenerate_interface_facets_are_measured_against_the_element_scale() {
    let (volume_rule, facet_rule) = rules(2, 2);
    let h = 1e-4;
    let vertices = [Point2::new(0.0, 0.0), Point2::new(h, 0.0), Point2::new(0.0, h)];

    // The interface cuts off a corner with legs of length ~1e-20. Relative to the element's
    // length scale h this is below the tolerance, even though it exceeds 1e-14 times the area.
    let values = [-1e-16, 1.0, 1.0];
    let interface = cut_rule(&vertices, &values, DomainType::If, &volume_rule, &facet_rule);
    assert!(interface.weights.is_empty());
    let pos = cut_rule(&vertices, &values, DomainType::Pos, &volume_rule, &facet_rule);
    assert_scalar_eq!(weight_sum(&pos), 0.5 * h * h, comp = abs, tol = 1e-20);

    // A corner with legs of length ~1e-12 is resolved
    let values = [-1e-8, 1.0, 1.0];
    let interface = cut_rule(&vertices, &values, DomainType::If, &volume_rule, &facet_rule);
    assert!(!interface.weights.is_empty());
    let leg = h * 1e-8 / (1.0 + 1e-8);
    assert_scalar_eq!(weight_sum(&interface), leg * 2.0f64.sqrt(), comp = abs, tol = 1e-24);
}
