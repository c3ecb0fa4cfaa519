//! Active degrees of freedom of restricted finite element spaces.
//!
//! Fictitious-domain and trace spaces only use the dofs whose basis functions are supported on
//! elements of interest, e.g. all elements with a negative part. The selection is expressed as
//! a [`DofMask`].
use crate::classify::{ElementClassification, TagSet};
use crate::error::check_len;
use crate::mesh::MeshId;
use crate::space::{FiniteElementSpace, ProductSpace};
use crate::Error;

/// A boolean flag per global degree of freedom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMask {
    mesh_id: MeshId,
    active: Vec<bool>,
}

impl DofMask {
    pub fn from_flags(mesh_id: MeshId, active: Vec<bool>) -> Self {
        Self { mesh_id, active }
    }

    /// A mask with all dofs active.
    pub fn full(mesh_id: MeshId, num_dofs: usize) -> Self {
        Self::from_flags(mesh_id, vec![true; num_dofs])
    }

    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.active
    }

    pub fn is_active(&self, dof: usize) -> bool {
        self.active.get(dof).copied().unwrap_or(false)
    }

    pub fn count_active(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    pub fn active_indices(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, a)| **a)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn check_compatible(&self, other: &DofMask) -> Result<(), Error> {
        self.mesh_id.check(other.mesh_id)?;
        check_len(self.len(), other.len())
    }

    /// Dofs active in both masks.
    pub fn and(&self, other: &DofMask) -> Result<DofMask, Error> {
        self.check_compatible(other)?;
        let active = self
            .active
            .iter()
            .zip(&other.active)
            .map(|(a, b)| *a && *b)
            .collect();
        Ok(Self::from_flags(self.mesh_id, active))
    }

    /// Dofs active in either mask.
    pub fn or(&self, other: &DofMask) -> Result<DofMask, Error> {
        self.check_compatible(other)?;
        let active = self
            .active
            .iter()
            .zip(&other.active)
            .map(|(a, b)| *a || *b)
            .collect();
        Ok(Self::from_flags(self.mesh_id, active))
    }

    /// Concatenates masks of the components of a product space, in order.
    ///
    /// # Panics
    ///
    /// Panics if `masks` is empty.
    pub fn concat(masks: &[DofMask]) -> Result<DofMask, Error> {
        assert!(!masks.is_empty(), "Cannot concatenate an empty list of masks");
        let mesh_id = masks[0].mesh_id;
        let mut active = Vec::with_capacity(masks.iter().map(|m| m.len()).sum());
        for mask in masks {
            mesh_id.check(mask.mesh_id)?;
            active.extend_from_slice(&mask.active);
        }
        Ok(Self::from_flags(mesh_id, active))
    }
}

/// Marks the dofs that are supported on at least one element whose tag is in `tags`.
pub fn dofs_of_elements<S>(space: &S, classification: &ElementClassification, tags: TagSet) -> Result<DofMask, Error>
where
    S: FiniteElementSpace + ?Sized,
{
    space.mesh_id().check(classification.mesh_id())?;
    check_len(space.num_elements(), classification.num_elements())?;
    let mut active = vec![false; space.num_dofs()];
    for element in 0..space.num_elements() {
        if classification.is_in(element, tags) {
            for &dof in space.element_dofs(element) {
                active[dof] = true;
            }
        }
    }
    Ok(DofMask::from_flags(space.mesh_id(), active))
}

/// Masks every component of a product space against its own tag set and concatenates the
/// masks in component order.
///
/// A typical two-sided setup uses `[TagSet::HAS_NEG, TagSet::HAS_POS]`.
pub fn compound_dofs_of_elements<S>(
    space: &ProductSpace<S>,
    classification: &ElementClassification,
    tags: &[TagSet],
) -> Result<DofMask, Error>
where
    S: FiniteElementSpace,
{
    check_len(space.num_components(), tags.len())?;
    let masks = space
        .components()
        .iter()
        .zip(tags)
        .map(|(component, &component_tags)| dofs_of_elements(component, classification, component_tags))
        .collect::<Result<Vec<_>, _>>()?;
    DofMask::concat(&masks)
}

/// The dofs that are both natively free in the space and active in the mask.
pub fn free_dofs<S>(space: &S, mask: &DofMask) -> Result<DofMask, Error>
where
    S: FiniteElementSpace + ?Sized,
{
    space.native_free_dofs().and(mask)
}
