//! Legacy cut quadrature by subdivision of the reference element.
//!
//! The reference element is uniformly subdivided a fixed number of times. The exact level-set
//! function is evaluated at the vertices of every sub-simplex and each sub-simplex is cut
//! linearly. This improves the geometric approximation of the interface at the price of many
//! more quadrature points, and is superseded by the isoparametric deformation in
//! [`deformation`](crate::deformation). It is kept as an alternative
//! [`CutQuadratureStrategy`] for comparison with results obtained this way.
use crate::allocators::DimAllocator;
use crate::cut::{append_cut_rule, CutRule, DomainType};
use crate::element::{reference_vertices, ElementMap};
use crate::integrate::{CutQuadratureStrategy, ElementCutInput};
use crate::levelset::LevelSetFunction;
use crate::mesh::refinement::populate_simplex_children;
use crate::quadrature::simplex::BarycentricRuleTable;
use crate::{Error, Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint};

/// Subdivides the reference simplex `levels` times.
///
/// Returns the vertices of the sub-simplices, `D + 1` consecutive vertices per sub-simplex.
pub fn subdivide_reference_simplex<T, D>(levels: usize) -> Vec<OPoint<T, D>>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let n = D::dim() + 1;
    let local_indices: Vec<usize> = (0..n).collect();
    let mut simplices = reference_vertices::<T, D>();
    let mut labels = Vec::new();
    for _ in 0..levels {
        let mut refined = Vec::with_capacity(simplices.len() * (1 << D::dim()));
        for parent in simplices.chunks_exact(n) {
            labels.clear();
            populate_simplex_children(&local_indices, &mut labels);
            refined.extend(labels.iter().map(|label| label.position(parent)));
        }
        simplices = refined;
    }
    simplices
}

/// Cuts every sub-simplex of a uniformly subdivided reference element along the exact level
/// set.
#[derive(Debug)]
pub struct SubdivisionCut<'a, F: ?Sized> {
    function: &'a F,
    levels: usize,
}

impl<'a, F: ?Sized> SubdivisionCut<'a, F> {
    pub fn new(function: &'a F, levels: usize) -> Self {
        Self { function, levels }
    }

    pub fn levels(&self) -> usize {
        self.levels
    }
}

impl<'a, T, D, F> CutQuadratureStrategy<T, D> for SubdivisionCut<'a, F>
where
    T: Real,
    D: SmallDim,
    F: LevelSetFunction<T, D> + Sync + ?Sized,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_rule(
        &self,
        input: &ElementCutInput<'_, T, D>,
        domain: DomainType,
        strength: usize,
        rules: &BarycentricRuleTable<T>,
    ) -> Result<CutRule<T, D>, Error> {
        let d = D::dim();
        let volume_rule = rules.get(d, strength)?;
        let facet_rule = rules.get(d - 1, strength)?;

        let sub_simplices = subdivide_reference_simplex::<T, D>(self.levels);
        let mut rule = CutRule::empty();
        let mut values = Vec::with_capacity(d + 1);
        for sub_simplex in sub_simplices.chunks_exact(d + 1) {
            values.clear();
            for xi in sub_simplex {
                let x = input.element.map_reference_coords(xi);
                let value = self
                    .function
                    .eval(&x)
                    .map_err(|source| Error::LevelSetEvaluationInElement {
                        element: input.index,
                        source,
                    })?;
                values.push(value);
            }
            append_cut_rule(&mut rule, sub_simplex, &values, domain, &volume_rule, &facet_rule);
        }
        Ok(rule)
    }
}
