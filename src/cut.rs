//! Decomposition of cut simplices and the resulting quadrature rules.
//!
//! A simplex whose vertex values change sign is cut along the zero level of the linear
//! interpolant of the values. Vertices with negative values form the negative side, vertices
//! with non-negative values the positive side. Each side is a convex polytope which is split
//! into simplices:
//!
//! - triangles: the isolated vertex gives a triangle, the opposite side a quadrilateral split
//!   into two triangles; the interface is a segment,
//! - tetrahedra with one isolated vertex: a corner tetrahedron and a prism split into three
//!   tetrahedra; the interface is a triangle,
//! - tetrahedra with two vertices on each side: two prisms of three tetrahedra each; the
//!   interface is a quadrilateral split into two triangles.
//!
//! Every sub-simplex receives a simplex quadrature rule, so the resulting rules integrate
//! polynomials exactly over the (polyhedral) sub-regions.
use crate::allocators::DimAllocator;
use crate::classify::{classify_element, ElementTag, TagSet};
use crate::quadrature::simplex::{simplex_measure, BarycentricRule};
use crate::quadrature::OwnedQuadratureParts;
use crate::{Error, Real, SmallDim};
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Sub-simplices whose measure falls below this fraction of the measure of the decomposed
/// simplex are discarded. Interface facets are compared against the corresponding power of
/// the diameter scale of the simplex.
pub const DEGENERATE_MEASURE_TOLERANCE: f64 = 1e-14;

/// The part of an element to integrate over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DomainType {
    /// The region where the level set is negative.
    Neg,
    /// The region where the level set is positive.
    Pos,
    /// The zero level set.
    If,
}

impl DomainType {
    pub const ALL: [DomainType; 3] = [DomainType::Neg, DomainType::Pos, DomainType::If];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainType::Neg => "NEG",
            DomainType::Pos => "POS",
            DomainType::If => "IF",
        }
    }

    /// Tags of the elements that contribute to the domain.
    pub fn element_tags(&self) -> TagSet {
        match self {
            DomainType::Neg => TagSet::HAS_NEG,
            DomainType::Pos => TagSet::HAS_POS,
            DomainType::If => TagSet::IF,
        }
    }
}

impl Display for DomainType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DomainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEG" => Ok(DomainType::Neg),
            "POS" => Ok(DomainType::Pos),
            "IF" => Ok(DomainType::If),
            _ => Err(Error::InvalidDomainType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DomainType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DomainType> for String {
    fn from(domain: DomainType) -> Self {
        domain.as_str().to_string()
    }
}

/// A simplex split into negative and positive sub-simplices and interface facets.
///
/// Sub-simplices are stored as consecutive groups of `D + 1` vertices, interface facets as
/// groups of `D` vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexDecomposition<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    negative: Vec<OPoint<T, D>>,
    positive: Vec<OPoint<T, D>>,
    interface: Vec<OPoint<T, D>>,
    /// Unit gradient of the linear interpolant, present if the simplex is cut.
    normal: Option<OVector<T, D>>,
}

impl<T, D> SimplexDecomposition<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn negative_simplices(&self) -> impl '_ + Iterator<Item = &[OPoint<T, D>]> {
        self.negative.chunks_exact(D::dim() + 1)
    }

    pub fn positive_simplices(&self) -> impl '_ + Iterator<Item = &[OPoint<T, D>]> {
        self.positive.chunks_exact(D::dim() + 1)
    }

    pub fn interface_facets(&self) -> impl '_ + Iterator<Item = &[OPoint<T, D>]> {
        self.interface.chunks_exact(D::dim())
    }

    /// The unit normal of the interface, pointing from the negative to the positive side.
    pub fn normal(&self) -> Option<&OVector<T, D>> {
        self.normal.as_ref()
    }

    fn side_mut(&mut self, negative: bool) -> &mut Vec<OPoint<T, D>> {
        if negative {
            &mut self.negative
        } else {
            &mut self.positive
        }
    }
}

/// Intersection of the edge `(i, j)` with the zero level of the linear interpolant.
fn edge_cut<T, D>(vertices: &[OPoint<T, D>], values: &[T], i: usize, j: usize) -> OPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let t = values[i] / (values[i] - values[j]);
    &vertices[i] + (&vertices[j] - &vertices[i]) * t
}

/// Appends the three tetrahedra of the prism with bottom triangle `a` and top triangle `b`,
/// where `a[k]` and `b[k]` are connected by a lateral edge.
fn push_prism<P: Clone>(out: &mut Vec<P>, a: [&P; 3], b: [&P; 3]) {
    let [a0, a1, a2] = a;
    let [b0, b1, b2] = b;
    for tet in [[a0, a1, a2, b0], [a1, a2, b0, b1], [a2, b0, b1, b2]] {
        out.extend(tet.into_iter().cloned());
    }
}

/// Gradient of the linear interpolant of `values` in the coordinates of `vertices`.
fn linear_gradient<T, D>(vertices: &[OPoint<T, D>], values: &[T]) -> Option<OVector<T, D>>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let v0 = &vertices[0];
    let edges = OMatrix::<T, D, D>::from_fn(|r, c| vertices[c + 1][r] - v0[r]);
    let differences = OVector::<T, D>::from_fn(|i, _| values[i + 1] - values[0]);
    Some(edges.transpose().try_inverse()? * differences)
}

/// Splits the simplex with the given vertices along the zero level of the linear interpolant of
/// `values`.
///
/// A simplex that is not cut (see [`classify_element`]) is returned whole on the side given by
/// its classification, without interface.
///
/// # Panics
///
/// Panics if the number of vertices or values is not `D + 1`, or if `D > 3`.
pub fn decompose_simplex<T, D>(vertices: &[OPoint<T, D>], values: &[T]) -> SimplexDecomposition<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let n = D::dim() + 1;
    assert_eq!(vertices.len(), n);
    assert_eq!(values.len(), n);

    let mut decomposition = SimplexDecomposition {
        negative: Vec::new(),
        positive: Vec::new(),
        interface: Vec::new(),
        normal: None,
    };

    match classify_element(values) {
        ElementTag::Negative => {
            decomposition.negative.extend_from_slice(vertices);
            return decomposition;
        }
        ElementTag::Positive => {
            decomposition.positive.extend_from_slice(vertices);
            return decomposition;
        }
        ElementTag::Cut => {}
    }

    decomposition.normal = linear_gradient(vertices, values)
        .and_then(|g| g.try_normalize(T::zero()));

    let (neg, nonneg): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| values[i] < T::zero());
    let x = |i: usize, j: usize| edge_cut(vertices, values, i, j);
    let p = |i: usize| vertices[i].clone();

    match (D::dim(), neg.len()) {
        (1, _) => {
            let (i, j) = (neg[0], nonneg[0]);
            let x_ij = x(i, j);
            decomposition.negative.extend([p(i), x_ij.clone()]);
            decomposition.positive.extend([x_ij.clone(), p(j)]);
            decomposition.interface.push(x_ij);
        }
        (2, _) => {
            // The vertex that is alone on its side
            let isolated_is_negative = neg.len() == 1;
            let (i, j, k) = if isolated_is_negative {
                (neg[0], nonneg[0], nonneg[1])
            } else {
                (nonneg[0], neg[0], neg[1])
            };
            let (x_ij, x_ik) = (x(i, j), x(i, k));
            decomposition
                .side_mut(isolated_is_negative)
                .extend([p(i), x_ij.clone(), x_ik.clone()]);
            decomposition.side_mut(!isolated_is_negative).extend([
                x_ij.clone(),
                p(j),
                p(k),
                x_ij.clone(),
                p(k),
                x_ik.clone(),
            ]);
            decomposition.interface.extend([x_ij, x_ik]);
        }
        (3, 1) | (3, 3) => {
            let isolated_is_negative = neg.len() == 1;
            let (i, others) = if isolated_is_negative {
                (neg[0], [nonneg[0], nonneg[1], nonneg[2]])
            } else {
                (nonneg[0], [neg[0], neg[1], neg[2]])
            };
            let [j, k, l] = others;
            let (x_ij, x_ik, x_il) = (x(i, j), x(i, k), x(i, l));
            let (p_j, p_k, p_l) = (p(j), p(k), p(l));
            decomposition
                .side_mut(isolated_is_negative)
                .extend([p(i), x_ij.clone(), x_ik.clone(), x_il.clone()]);
            push_prism(
                decomposition.side_mut(!isolated_is_negative),
                [&x_ij, &x_ik, &x_il],
                [&p_j, &p_k, &p_l],
            );
            decomposition.interface.extend([x_ij, x_ik, x_il]);
        }
        (3, 2) => {
            let (i, j) = (neg[0], neg[1]);
            let (k, l) = (nonneg[0], nonneg[1]);
            let (x_ik, x_il, x_jk, x_jl) = (x(i, k), x(i, l), x(j, k), x(j, l));
            let (p_i, p_j, p_k, p_l) = (p(i), p(j), p(k), p(l));
            push_prism(&mut decomposition.negative, [&p_i, &x_ik, &x_il], [&p_j, &x_jk, &x_jl]);
            push_prism(&mut decomposition.positive, [&p_k, &x_ik, &x_jk], [&p_l, &x_il, &x_jl]);
            decomposition.interface.extend([
                x_ik.clone(),
                x_il.clone(),
                x_jl.clone(),
                x_ik,
                x_jl,
                x_jk,
            ]);
        }
        _ => panic!("Simplex decomposition is only supported in dimensions 1, 2 and 3"),
    }

    decomposition
}

/// A quadrature rule for a part of a simplex.
///
/// For interface rules the data holds the unit normal of the interface at each point, in the
/// coordinates the rule is expressed in. For volume rules the data is the zero vector.
pub type CutRule<T, D> = OwnedQuadratureParts<T, D, OVector<T, D>>;

/// Checks a piece of intrinsic dimension `k` against the scale of the decomposed simplex.
fn is_degenerate<T: Real>(measure: T, k: usize, parent_measure: T, parent_dim: usize) -> bool {
    let tolerance = T::from_f64(DEGENERATE_MEASURE_TOLERANCE).unwrap();
    let scale = parent_measure.powf(T::from_usize(k).unwrap() / T::from_usize(parent_dim).unwrap());
    !(measure > tolerance * scale)
}

/// Appends a rule for the requested part of the simplex with the given vertices to `rule`.
///
/// Volume pieces use `volume_rule` and interface facets `facet_rule`. Weights are measures in
/// the coordinates of `vertices`. Degenerate pieces are dropped, so all weights are finite and
/// non-negative.
pub fn append_cut_rule<T, D>(
    rule: &mut CutRule<T, D>,
    vertices: &[OPoint<T, D>],
    values: &[T],
    domain: DomainType,
    volume_rule: &BarycentricRule<T>,
    facet_rule: &BarycentricRule<T>,
) where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let parent_measure = simplex_measure(vertices);
    if !(parent_measure > T::zero()) {
        return;
    }
    let decomposition = decompose_simplex(vertices, values);
    let d = D::dim();

    let (pieces, piece_rule, data): (Vec<&[OPoint<T, D>]>, _, _) = match domain {
        DomainType::Neg => (decomposition.negative_simplices().collect(), volume_rule, OVector::<T, D>::zeros()),
        DomainType::Pos => (decomposition.positive_simplices().collect(), volume_rule, OVector::<T, D>::zeros()),
        DomainType::If => match decomposition.normal() {
            Some(normal) => (decomposition.interface_facets().collect(), facet_rule, normal.clone()),
            None => return,
        },
    };

    for piece in pieces {
        let k = piece.len() - 1;
        let measure = simplex_measure(piece);
        if is_degenerate(measure, k, parent_measure, d) {
            continue;
        }
        let before = rule.weights.len();
        piece_rule.map_to_simplex(piece, measure, &mut rule.weights, &mut rule.points);
        let added = rule.weights.len() - before;
        rule.data.extend(std::iter::repeat(data.clone()).take(added));
    }
}

/// Computes the rule for the requested part of a simplex.
///
/// See [`append_cut_rule`].
pub fn cut_rule<T, D>(
    vertices: &[OPoint<T, D>],
    values: &[T],
    domain: DomainType,
    volume_rule: &BarycentricRule<T>,
    facet_rule: &BarycentricRule<T>,
) -> CutRule<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut rule = CutRule::empty();
    append_cut_rule(&mut rule, vertices, values, domain, volume_rule, facet_rule);
    rule
}

/// The factor relating an interface measure in reference coordinates to the physical one.
///
/// For the map $x(\xi)$ with Jacobian $J$ and the unit reference normal $\hat n$, Nanson's
/// formula gives $dS_x = |\det J| \, |J^{-T} \hat n| \, dS_\xi$. Returns zero if $J$ is
/// singular.
pub fn interface_measure_factor<T, D>(jacobian: &OMatrix<T, D, D>, reference_normal: &OVector<T, D>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let det = jacobian.determinant().abs();
    match jacobian.clone().try_inverse() {
        Some(j_inv) => det * (j_inv.transpose() * reference_normal).norm(),
        None => T::zero(),
    }
}
