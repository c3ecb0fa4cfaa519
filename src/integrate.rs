//! Integration over the negative region, the positive region and the interface of a level set.
//!
//! Rules are first constructed on the reference element, where cut elements are decomposed by a
//! [`CutQuadratureStrategy`], and then mapped to physical space through the (possibly deformed)
//! element map. Reference rules of cut elements are cached per element, domain and strength.
use crate::allocators::DimAllocator;
use crate::classify::{ElementClassification, ElementTag};
use crate::connectivity::SimplexConnectivity;
use crate::cut::{cut_rule, interface_measure_factor, CutRule, DomainType};
use crate::deformation::{DeformationField, DeformedElement};
use crate::element::{reference_measure, reference_vertices, ElementMap, SimplexElement};
use crate::levelset::{LevelSetField, LevelSetFunction};
use crate::mesh::Mesh;
use crate::quadrature::cache::CutQuadratureCache;
use crate::quadrature::simplex::BarycentricRuleTable;
use crate::quadrature::subdivide::SubdivisionCut;
use crate::quadrature::OwnedQuadratureParts;
use crate::{Error, Real, SmallDim};
use log::warn;
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, OMatrix, OPoint, OVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The data a [`CutQuadratureStrategy`] needs about a single element.
#[derive(Debug, Clone, Copy)]
pub struct ElementCutInput<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub index: usize,
    pub tag: ElementTag,
    /// P1 level-set values at the vertices of the element.
    pub values: &'a [T],
    /// The undeformed geometry of the element.
    pub element: &'a SimplexElement<T, D>,
}

/// Constructs quadrature rules for the parts of a cut element, in reference coordinates.
///
/// Volume rules carry the zero vector as data, interface rules the unit normal of the interface
/// in reference coordinates, pointing from the negative to the positive side. Weights are
/// measures in reference coordinates.
pub trait CutQuadratureStrategy<T, D>: Send + Sync
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_rule(
        &self,
        input: &ElementCutInput<'_, T, D>,
        domain: DomainType,
        strength: usize,
        rules: &BarycentricRuleTable<T>,
    ) -> Result<CutRule<T, D>, Error>;
}

/// Cuts the reference element along the zero level of the P1 interpolant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearCut;

impl<T, D> CutQuadratureStrategy<T, D> for LinearCut
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn reference_rule(
        &self,
        input: &ElementCutInput<'_, T, D>,
        domain: DomainType,
        strength: usize,
        rules: &BarycentricRuleTable<T>,
    ) -> Result<CutRule<T, D>, Error> {
        let volume_rule = rules.get(D::dim(), strength)?;
        let facet_rule = rules.get(D::dim() - 1, strength)?;
        let vertices = reference_vertices::<T, D>();
        Ok(cut_rule(&vertices, input.values, domain, &volume_rule, &facet_rule))
    }
}

/// User-facing integration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    /// Quadrature strength used for every element, overriding the automatic choice.
    pub force_intorder: Option<usize>,
    /// Number of uniform subdivisions for the legacy subdivision strategy. `None` selects the
    /// linear cut.
    pub subdivlvl: Option<usize>,
}

/// Physical quantities attached to a quadrature point.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalPointData<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub position: OPoint<T, D>,
    /// Unit normal of the interface, pointing from the negative to the positive side. Zero for
    /// volume rules.
    pub normal: OVector<T, D>,
}

/// A rule with reference points, physical weights and physical point data.
pub type ElementQuadrature<T, D> = OwnedQuadratureParts<T, D, PhysicalPointData<T, D>>;

/// The map from the reference element to physical space, with or without deformation.
#[derive(Debug, Clone)]
pub enum ElementGeometry<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    Affine(SimplexElement<T, D>),
    Deformed(DeformedElement<'a, T, D>),
}

impl<'a, T, D> ElementMap<T, D> for ElementGeometry<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn map_reference_coords(&self, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        match self {
            ElementGeometry::Affine(element) => element.map_reference_coords(reference_coords),
            ElementGeometry::Deformed(element) => element.map_reference_coords(reference_coords),
        }
    }

    fn reference_jacobian(&self, reference_coords: &OPoint<T, D>) -> OMatrix<T, D, D> {
        match self {
            ElementGeometry::Affine(element) => element.reference_jacobian(reference_coords),
            ElementGeometry::Deformed(element) => element.reference_jacobian(reference_coords),
        }
    }
}

/// Integrates over the parts of a mesh defined by a P1 level set.
pub struct LevelSetIntegrator<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh: &'a Mesh<T, D, C>,
    field: &'a LevelSetField<T>,
    classification: &'a ElementClassification,
    deformation: Option<&'a DeformationField<T, D>>,
    strategy: Box<dyn CutQuadratureStrategy<T, D> + 'a>,
    force_intorder: Option<usize>,
    rules: BarycentricRuleTable<T>,
    cache: CutQuadratureCache<T, D>,
}

impl<'a, T, D, C> std::fmt::Debug for LevelSetIntegrator<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelSetIntegrator")
            .field("mesh_id", &self.mesh.id())
            .field("deformed", &self.deformation.is_some())
            .field("force_intorder", &self.force_intorder)
            .field("cached_rules", &self.cache.len())
            .finish()
    }
}

impl<'a, T, D, C> LevelSetIntegrator<'a, T, D, C>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    pub fn new(
        mesh: &'a Mesh<T, D, C>,
        field: &'a LevelSetField<T>,
        classification: &'a ElementClassification,
    ) -> Result<Self, Error> {
        mesh.id().check(field.mesh_id())?;
        mesh.id().check(classification.mesh_id())?;
        Ok(Self {
            mesh,
            field,
            classification,
            deformation: None,
            strategy: Box::new(LinearCut),
            force_intorder: None,
            rules: BarycentricRuleTable::new(),
            cache: CutQuadratureCache::new(mesh.id()),
        })
    }

    pub fn with_force_intorder(mut self, force_intorder: Option<usize>) -> Self {
        self.force_intorder = force_intorder;
        self
    }

    pub fn with_strategy(mut self, strategy: impl CutQuadratureStrategy<T, D> + 'a) -> Self {
        self.strategy = Box::new(strategy);
        self.cache.clear();
        self
    }

    /// Applies user settings. `function` is the exact level set, which the legacy subdivision
    /// strategy evaluates inside cut elements.
    pub fn with_settings<F>(self, settings: &IntegrationSettings, function: &'a F) -> Self
    where
        F: LevelSetFunction<T, D> + Sync + ?Sized,
    {
        let integrator = self.with_force_intorder(settings.force_intorder);
        match settings.subdivlvl {
            Some(levels) => {
                warn!(
                    "Using the legacy subdivision cut quadrature with {} levels. \
                     Isoparametric deformation is the preferred way to improve accuracy.",
                    levels
                );
                integrator.with_strategy(SubdivisionCut::new(function, levels))
            }
            None => integrator,
        }
    }

    /// Integrates on the mesh deformed by the given field.
    pub fn with_deformation(mut self, deformation: &'a DeformationField<T, D>) -> Result<Self, Error> {
        self.mesh.id().check(deformation.mesh_id())?;
        self.deformation = Some(deformation);
        Ok(self)
    }

    pub fn mesh(&self) -> &'a Mesh<T, D, C> {
        self.mesh
    }

    pub fn classification(&self) -> &'a ElementClassification {
        self.classification
    }

    pub fn deformation(&self) -> Option<&'a DeformationField<T, D>> {
        self.deformation
    }

    pub fn cache(&self) -> &CutQuadratureCache<T, D> {
        &self.cache
    }

    /// The quadrature strength used on the element for integrands of polynomial degree
    /// `order`.
    ///
    /// Elements displaced by a deformation of order `k` need `order + D (k - 1)` to account for
    /// the polynomial Jacobian determinant.
    pub fn quadrature_strength(&self, element: usize, order: usize) -> usize {
        if let Some(forced) = self.force_intorder {
            return forced;
        }
        match self.deformation {
            Some(deformation) if deformation.is_element_displaced(element) => {
                order + D::dim() * (deformation.order() - 1)
            }
            _ => order,
        }
    }

    fn check_element(&self, element: usize) -> Result<SimplexElement<T, D>, Error> {
        self.mesh.checked_simplex_element(element)
    }

    /// The rule for the requested part of the element in reference coordinates.
    ///
    /// Weights are reference measures. See [`CutQuadratureStrategy`] for the data.
    pub fn reference_rule(&self, element: usize, domain: DomainType, strength: usize) -> Result<Arc<CutRule<T, D>>, Error> {
        let simplex = self.check_element(element)?;
        let tag = self
            .classification
            .tag(element)
            .ok_or(Error::ElementOutOfBounds {
                index: element,
                num_elements: self.classification.num_elements(),
            })?;

        let covers_element = matches!(
            (tag, domain),
            (ElementTag::Negative, DomainType::Neg) | (ElementTag::Positive, DomainType::Pos)
        );
        match tag {
            ElementTag::Cut => {
                let vertex_indices = self.mesh.vertices_of(element).unwrap_or(&[]);
                let mut values = Vec::with_capacity(D::dim() + 1);
                self.field.gather(vertex_indices, &mut values);
                let input = ElementCutInput {
                    index: element,
                    tag,
                    values: &values,
                    element: &simplex,
                };
                self.cache
                    .get_or_try_insert_with((element, domain, strength), || {
                        self.strategy
                            .reference_rule(&input, domain, strength, &self.rules)
                    })
            }
            _ if covers_element => {
                let volume_rule = self.rules.get(D::dim(), strength)?;
                let mut rule = CutRule::empty();
                volume_rule.map_to_simplex(
                    &reference_vertices::<T, D>(),
                    reference_measure(D::dim()),
                    &mut rule.weights,
                    &mut rule.points,
                );
                rule.data = vec![OVector::<T, D>::zeros(); rule.weights.len()];
                Ok(Arc::new(rule))
            }
            _ => Ok(Arc::new(CutRule::empty())),
        }
    }

    /// The map from the reference element to the (possibly deformed) physical element.
    pub fn element_geometry(&self, element: usize) -> Result<ElementGeometry<'a, T, D>, Error> {
        let simplex = self.check_element(element)?;
        let deformed = self
            .deformation
            .filter(|deformation| deformation.is_element_displaced(element));
        Ok(match deformed {
            Some(deformation) => match deformation.deformed_element(element, simplex.clone()) {
                Some(deformed) => ElementGeometry::Deformed(deformed),
                None => ElementGeometry::Affine(simplex),
            },
            None => ElementGeometry::Affine(simplex),
        })
    }

    /// The rule for the requested part of the element, exact for polynomials of degree `order`
    /// on affine elements.
    ///
    /// Points are reference coordinates, weights are physical measures, and the data holds the
    /// physical points and normals.
    pub fn element_quadrature(
        &self,
        element: usize,
        domain: DomainType,
        order: usize,
    ) -> Result<ElementQuadrature<T, D>, Error> {
        let strength = self.quadrature_strength(element, order);
        let reference = self.reference_rule(element, domain, strength)?;
        let geometry = self.element_geometry(element)?;

        let mut quadrature = ElementQuadrature::empty();
        for (w, xi, reference_normal) in reference.iter() {
            let jacobian = geometry.reference_jacobian(xi);
            let (weight, normal) = match domain {
                DomainType::If => {
                    let factor = interface_measure_factor(&jacobian, reference_normal);
                    let normal = jacobian
                        .clone()
                        .try_inverse()
                        .and_then(|j_inv| (j_inv.transpose() * reference_normal).try_normalize(T::zero()))
                        .unwrap_or_else(OVector::<T, D>::zeros);
                    (*w * factor, normal)
                }
                DomainType::Neg | DomainType::Pos => (*w * jacobian.determinant().abs(), OVector::<T, D>::zeros()),
            };
            let position = geometry.map_reference_coords(xi);
            quadrature.push(weight, xi.clone(), PhysicalPointData { position, normal });
        }
        Ok(quadrature)
    }

    /// Integrates `f` over the requested part of a single element.
    pub fn integrate_element<F>(&self, element: usize, domain: DomainType, order: usize, f: F) -> Result<T, Error>
    where
        F: Fn(&OPoint<T, D>) -> T,
    {
        let quadrature = self.element_quadrature(element, domain, order)?;
        Ok(quadrature
            .iter()
            .fold(T::zero(), |acc, (w, _, data)| acc + *w * f(&data.position)))
    }

    /// Integrates `f` over the requested part of the mesh.
    ///
    /// Elements are processed in parallel and the element contributions are summed in element
    /// order, so the result does not depend on the number of threads.
    pub fn integrate<F>(&self, domain: DomainType, order: usize, f: F) -> Result<T, Error>
    where
        F: Fn(&OPoint<T, D>) -> T + Sync,
    {
        let elements = self.classification.elements_in(domain.element_tags());
        let contributions = elements
            .par_iter()
            .map(|&element| self.integrate_element(element, domain, order, &f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contributions
            .into_iter()
            .fold(T::zero(), |acc, x| acc + x))
    }

    /// Measure of the requested part of the mesh.
    pub fn measure(&self, domain: DomainType) -> Result<T, Error> {
        self.integrate(domain, 0, |_| T::one())
    }

    /// Physical measure of the whole (possibly deformed) element.
    pub fn element_measure(&self, element: usize) -> Result<T, Error> {
        let simplex = self.check_element(element)?;
        match self.element_geometry(element)? {
            ElementGeometry::Affine(_) => Ok(simplex.measure()),
            geometry @ ElementGeometry::Deformed(_) => {
                let strength = self.quadrature_strength(element, 0);
                let volume_rule = self.rules.get(D::dim(), strength)?;
                let mut weights = Vec::new();
                let mut points = Vec::new();
                volume_rule.map_to_simplex(
                    &reference_vertices::<T, D>(),
                    reference_measure(D::dim()),
                    &mut weights,
                    &mut points,
                );
                Ok(weights
                    .iter()
                    .zip(&points)
                    .fold(T::zero(), |acc, (w, xi)| {
                        acc + *w * geometry.reference_jacobian(xi).determinant().abs()
                    }))
            }
        }
    }
}
