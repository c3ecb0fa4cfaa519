//! Helpers for two-sided interface coupling.
//!
//! Unfitted methods with one discretization per side of the interface couple the sides through
//! averages and jumps on the interface. The averages are usually weighted by the cut ratios
//! $\kappa_\pm = |T \cap \Omega_\pm| / |T|$ of the cut element $T$.
use crate::allocators::DimAllocator;
use crate::classify::TagSet;
use crate::connectivity::SimplexConnectivity;
use crate::cut::DomainType;
use crate::integrate::LevelSetIntegrator;
use crate::{Error, Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::DefaultAllocator;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// One side of the interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Negative,
    Positive,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Negative, Side::Positive];

    pub fn opposite(&self) -> Side {
        match self {
            Side::Negative => Side::Positive,
            Side::Positive => Side::Negative,
        }
    }

    /// The volume domain of the side.
    pub fn domain(&self) -> DomainType {
        match self {
            Side::Negative => DomainType::Neg,
            Side::Positive => DomainType::Pos,
        }
    }

    /// Tags of the elements that carry dofs of the side.
    pub fn element_tags(&self) -> TagSet {
        self.domain().element_tags()
    }
}

/// A value per side of the interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideTable<V> {
    pub negative: V,
    pub positive: V,
}

impl<V> SideTable<V> {
    pub fn new(negative: V, positive: V) -> Self {
        Self { negative, positive }
    }

    pub fn from_fn(mut f: impl FnMut(Side) -> V) -> Self {
        Self {
            negative: f(Side::Negative),
            positive: f(Side::Positive),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(V) -> U) -> SideTable<U> {
        SideTable {
            negative: f(self.negative),
            positive: f(self.positive),
        }
    }

    pub fn as_ref(&self) -> SideTable<&V> {
        SideTable {
            negative: &self.negative,
            positive: &self.positive,
        }
    }

    /// The weighted average $w_- v_- + w_+ v_+$.
    pub fn average<W>(&self, weights: &SideTable<W>) -> V
    where
        V: Clone + Mul<W, Output = V> + Add<Output = V>,
        W: Clone,
    {
        self.negative.clone() * weights.negative.clone() + self.positive.clone() * weights.positive.clone()
    }

    /// The jump $v_- - v_+$ across the interface.
    pub fn jump(&self) -> V
    where
        V: Clone + Sub<Output = V>,
    {
        self.negative.clone() - self.positive.clone()
    }
}

impl<V> Index<Side> for SideTable<V> {
    type Output = V;

    fn index(&self, side: Side) -> &V {
        match side {
            Side::Negative => &self.negative,
            Side::Positive => &self.positive,
        }
    }
}

impl<V> IndexMut<Side> for SideTable<V> {
    fn index_mut(&mut self, side: Side) -> &mut V {
        match side {
            Side::Negative => &mut self.negative,
            Side::Positive => &mut self.positive,
        }
    }
}

/// The cut ratios $\kappa_\pm = |T \cap \Omega_\pm| / |T|$ of an element.
///
/// The ratios sum to one. Uncut elements have ratio one on their own side. An element without
/// measure on either side gets equal ratios.
pub fn cut_ratios<T, D, C>(integrator: &LevelSetIntegrator<'_, T, D, C>, element: usize) -> Result<SideTable<T>, Error>
where
    T: Real,
    D: SmallDim,
    C: SimplexConnectivity<D>,
    DefaultAllocator: DimAllocator<T, D>,
    <DefaultAllocator as Allocator<T, D>>::Buffer: Send + Sync,
{
    let measures = SideTable {
        negative: integrator.integrate_element(element, DomainType::Neg, 0, |_| T::one())?,
        positive: integrator.integrate_element(element, DomainType::Pos, 0, |_| T::one())?,
    };
    let total = measures.negative + measures.positive;
    if total > T::zero() {
        Ok(measures.map(|m| m / total))
    } else {
        let half = T::from_f64(0.5).unwrap();
        Ok(SideTable::new(half, half))
    }
}

/// The Nitsche penalty parameter $\lambda k^2 / h$ for elements of order `k` and size `h`.
pub fn nitsche_penalty<T: Real>(lambda: T, order: usize, h: T) -> T {
    let k = T::from_usize(order.max(1)).unwrap();
    lambda * k * k / h
}
