//! Caching of reference rules for cut elements.
use crate::allocators::DimAllocator;
use crate::cut::{CutRule, DomainType};
use crate::mesh::MeshId;
use crate::{Error, Real, SmallDim};
use nalgebra::DefaultAllocator;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Cache key: element index, domain and quadrature strength.
pub type CutRuleKey = (usize, DomainType, usize);

/// A thread-safe cache of reference rules for cut elements.
///
/// The cache belongs to a single mesh. Rules are immutable once inserted.
#[derive(Debug)]
pub struct CutQuadratureCache<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    mesh_id: MeshId,
    rules: RwLock<FxHashMap<CutRuleKey, Arc<CutRule<T, D>>>>,
}

impl<T, D> CutQuadratureCache<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(mesh_id: MeshId) -> Self {
        Self {
            mesh_id,
            rules: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn mesh_id(&self) -> MeshId {
        self.mesh_id
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    pub fn get(&self, key: &CutRuleKey) -> Option<Arc<CutRule<T, D>>> {
        self.rules.read().get(key).cloned()
    }

    /// Returns the cached rule, or constructs and caches it.
    ///
    /// The construction runs without holding the lock, so two threads may construct the same
    /// rule concurrently. The first inserted rule wins.
    pub fn get_or_try_insert_with<F>(&self, key: CutRuleKey, construct: F) -> Result<Arc<CutRule<T, D>>, Error>
    where
        F: FnOnce() -> Result<CutRule<T, D>, Error>,
    {
        if let Some(rule) = self.get(&key) {
            return Ok(rule);
        }
        let rule = Arc::new(construct()?);
        Ok(Arc::clone(self.rules.write().entry(key).or_insert(rule)))
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }
}
