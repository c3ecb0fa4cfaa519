//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// Bundles the allocations needed to work with simplices embedded in `D` dimensions.
///
/// Covers points and vectors (`D`), Jacobians of element maps (`D x D`), level-set gradients
/// stored as row vectors (`1 x D`) and the permutation storage used by LU factorizations when
/// computing determinants and inverses of Jacobians.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D> + Allocator<usize, D> + Allocator<(usize, usize), D>
{
}

impl<T: Scalar, D: DimName> DimAllocator<T, D> for DefaultAllocator where
    DefaultAllocator:
        Allocator<T, D> + Allocator<T, D, D> + Allocator<T, U1, D> + Allocator<usize, D> + Allocator<(usize, usize), D>
{
}
