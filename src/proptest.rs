//! Strategies for property-based testing of cut elements.
use crate::element::SimplexElement;
use ::proptest::prelude::*;
use nalgebra::{Point2, Point3, U2, U3};

pub fn point2() -> impl Strategy<Value = Point2<f64>> {
    // Moderate coordinates keep the geometric predicates well conditioned
    let range = -10.0..10.0;
    [range.clone(), range.clone()].prop_map(|[x, y]| Point2::new(x, y))
}

pub fn point3() -> impl Strategy<Value = Point3<f64>> {
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range.clone()].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// A single level-set value. Exact zeros are generated with non-negligible probability, since
/// they are the interesting edge case of classification and decomposition.
pub fn levelset_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        4 => -1.0..1.0,
    ]
}

/// Level-set values for the `n` vertices of a simplex.
pub fn levelset_values(n: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(levelset_value(), n)
}

/// Level-set values with at least one strictly negative and one strictly positive entry.
pub fn cut_levelset_values(n: usize) -> impl Strategy<Value = Vec<f64>> {
    levelset_values(n).prop_filter("values must change sign", |values| {
        values.iter().any(|v| *v < 0.0) && values.iter().any(|v| *v > 0.0)
    })
}

/// Positively oriented triangles whose area is not too small relative to their diameter.
pub fn nondegenerate_triangle() -> impl Strategy<Value = SimplexElement<f64, U2>> {
    [point2(), point2(), point2()]
        .prop_filter_map("triangle must not be degenerate", |[a, b, c]| {
            let ab = b - a;
            let ac = c - a;
            let det = ab.x * ac.y - ab.y * ac.x;
            let scale = ab.norm_squared().max(ac.norm_squared()).max((c - b).norm_squared());
            if det.abs() <= 1e-3 * scale {
                None
            } else if det > 0.0 {
                Some(SimplexElement::from_vertices(vec![a, b, c]))
            } else {
                Some(SimplexElement::from_vertices(vec![a, c, b]))
            }
        })
}

/// Positively oriented tetrahedra whose volume is not too small relative to their diameter.
pub fn nondegenerate_tetrahedron() -> impl Strategy<Value = SimplexElement<f64, U3>> {
    [point3(), point3(), point3(), point3()].prop_filter_map("tetrahedron must not be degenerate", |[a, b, c, d]| {
        let (ab, ac, ad) = (b - a, c - a, d - a);
        let det = ab.cross(&ac).dot(&ad);
        let max_edge = [ab, ac, ad, c - b, d - b, d - c]
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max);
        if det.abs() <= 1e-3 * max_edge.powi(3) {
            None
        } else if det > 0.0 {
            Some(SimplexElement::from_vertices(vec![a, b, c, d]))
        } else {
            Some(SimplexElement::from_vertices(vec![a, c, b, d]))
        }
    })
}
