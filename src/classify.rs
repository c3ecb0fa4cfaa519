//! Classification of elements and facets relative to the zero level set.
use crate::allocators::DimAllocator;
use crate::connectivity::Connectivity;
use crate::levelset::LevelSetField;
use crate::mesh::{FacetNeighbors, Mesh, MeshFacets, MeshId};
use crate::{Error, Real, SmallDim};
use log::debug;
use nalgebra::DefaultAllocator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::BitOr;

/// Position of an element relative to the interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementTag {
    Negative,
    Positive,
    Cut,
}

/// Classifies an element from the level-set values at its vertices.
///
/// Zero counts as both non-positive and non-negative: an element is only [`Cut`](ElementTag::Cut)
/// if it has at least one strictly negative and at least one strictly positive value. An element
/// whose values are all zero is [`Negative`](ElementTag::Negative).
pub fn classify_element<T: Real>(values: &[T]) -> ElementTag {
    if values.iter().all(|v| *v <= T::zero()) {
        ElementTag::Negative
    } else if values.iter().all(|v| *v >= T::zero()) {
        ElementTag::Positive
    } else {
        ElementTag::Cut
    }
}

/// A set of element tags.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TagSet(u8);

impl TagSet {
    pub const EMPTY: Self = Self(0);
    pub const NEG: Self = Self(0b001);
    pub const POS: Self = Self(0b010);
    /// Cut elements, i.e. elements containing a part of the interface.
    pub const IF: Self = Self(0b100);
    pub const CUT: Self = Self::IF;
    /// Elements with a non-empty negative part.
    pub const HAS_NEG: Self = Self(Self::NEG.0 | Self::IF.0);
    /// Elements with a non-empty positive part.
    pub const HAS_POS: Self = Self(Self::POS.0 | Self::IF.0);
    pub const ANY: Self = Self(0b111);

    pub const fn of(tag: ElementTag) -> Self {
        match tag {
            ElementTag::Negative => Self::NEG,
            ElementTag::Positive => Self::POS,
            ElementTag::Cut => Self::IF,
        }
    }

    pub const fn contains(&self, tag: ElementTag) -> bool {
        self.0 & Self::of(tag).0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<ElementTag> for TagSet {
    fn from(tag: ElementTag) -> Self {
        Self::of(tag)
    }
}

impl BitOr for TagSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl Debug for TagSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names = [
            (ElementTag::Negative, "NEG"),
            (ElementTag::Positive, "POS"),
            (ElementTag::Cut, "IF"),
        ];
        let members: Vec<_> = names
            .iter()
            .filter(|(tag, _)| self.contains(*tag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TagSet({})", members.join(" | "))
    }
}

/// Tags of all elements of a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementClassification {
    mesh_id: MeshId,
    tags: Vec<ElementTag>,
}

impl ElementClassification {
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn tags(&self) -> &[ElementTag] {
        &self.tags
    }

    pub fn tag(&self, element: usize) -> Option<ElementTag> {
        self.tags.get(element).copied()
    }

    pub fn num_elements(&self) -> usize {
        self.tags.len()
    }

    /// Whether the element's tag is in `tags`.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn is_in(&self, element: usize, tags: TagSet) -> bool {
        tags.contains(self.tags[element])
    }

    pub fn elements_in(&self, tags: TagSet) -> Vec<usize> {
        self.tags
            .iter()
            .enumerate()
            .filter(|(_, tag)| tags.contains(**tag))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// One flag per element, set if the element's tag is in `tags`.
    pub fn mark(&self, tags: TagSet) -> Vec<bool> {
        self.tags.iter().map(|tag| tags.contains(*tag)).collect()
    }

    pub fn count(&self, tag: ElementTag) -> usize {
        self.tags.iter().filter(|t| **t == tag).count()
    }
}

/// Classifies every element of the mesh from the nodal level-set values.
pub fn classify_elements<T, D, C>(mesh: &Mesh<T, D, C>, field: &LevelSetField<T>) -> Result<ElementClassification, Error>
where
    T: Real,
    D: SmallDim,
    C: Connectivity + Sync,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh.id().check(field.mesh_id())?;
    let values = field.values();
    let tags: Vec<_> = mesh
        .connectivity()
        .par_iter()
        .map(|conn| {
            let element_values: Vec<T> = conn
                .vertex_indices()
                .iter()
                .map(|&v| values[v])
                .collect();
            classify_element(&element_values)
        })
        .collect();

    let classification = ElementClassification {
        mesh_id: mesh.id(),
        tags,
    };
    debug!(
        "Classified {} elements: {} negative, {} positive, {} cut",
        classification.num_elements(),
        classification.count(ElementTag::Negative),
        classification.count(ElementTag::Positive),
        classification.count(ElementTag::Cut)
    );
    Ok(classification)
}

/// How the memberships of the two neighbors of a facet are combined.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Combinator {
    /// `(left ∈ A ∧ right ∈ B) ∨ (right ∈ A ∧ left ∈ B)`
    And,
    /// `(left ∈ A ∨ right ∈ B) ∨ (right ∈ A ∨ left ∈ B)`
    Or,
}

/// Memberships substituted for the missing neighbor of a boundary facet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundaryPolicy {
    /// Whether the missing neighbor counts as a member of the first tag set.
    pub a: bool,
    /// Whether the missing neighbor counts as a member of the second tag set.
    pub b: bool,
}

/// A boolean flag per mesh facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetMarks {
    mesh_id: MeshId,
    marked: Vec<bool>,
}

impl FacetMarks {
    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.marked
    }

    pub fn is_marked(&self, facet: usize) -> bool {
        self.marked.get(facet).copied().unwrap_or(false)
    }

    pub fn marked_facets(&self) -> Vec<usize> {
        self.marked
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.marked.iter().filter(|m| **m).count()
    }
}

fn combine(left: (bool, bool), right: (bool, bool), combinator: Combinator) -> bool {
    let (left_a, left_b) = left;
    let (right_a, right_b) = right;
    match combinator {
        Combinator::And => (left_a && right_b) || (right_a && left_b),
        Combinator::Or => (left_a || right_b) || (right_a || left_b),
    }
}

/// Classifies a single facet given its neighbors.
pub fn classify_facet(
    neighbors: FacetNeighbors,
    classification: &ElementClassification,
    tags_a: TagSet,
    tags_b: TagSet,
    combinator: Combinator,
    boundary_policy: BoundaryPolicy,
) -> bool {
    let membership = |element: usize| {
        (
            classification.is_in(element, tags_a),
            classification.is_in(element, tags_b),
        )
    };
    let left = membership(neighbors.left);
    let right = neighbors
        .right
        .map(membership)
        .unwrap_or((boundary_policy.a, boundary_policy.b));
    combine(left, right, combinator)
}

/// Classifies every facet of the mesh from the tags of its neighboring elements.
///
/// The typical ghost-penalty selection, i.e. facets between a cut element and another element
/// with a negative part, is
/// `classify_facets(&facets, &classification, TagSet::HAS_NEG, TagSet::IF, Combinator::And, BoundaryPolicy::default())`.
pub fn classify_facets(
    facets: &MeshFacets,
    classification: &ElementClassification,
    tags_a: TagSet,
    tags_b: TagSet,
    combinator: Combinator,
    boundary_policy: BoundaryPolicy,
) -> Result<FacetMarks, Error> {
    facets.mesh_id().check(classification.mesh_id())?;
    let marked = facets
        .neighbors()
        .iter()
        .map(|neighbors| classify_facet(*neighbors, classification, tags_a, tags_b, combinator, boundary_policy))
        .collect();
    Ok(FacetMarks {
        mesh_id: facets.mesh_id(),
        marked,
    })
}
