//! Scalar distance calculations
//!
//! Integer element types are widened to f32 before accumulating, which is
//! exact for the 8-bit types at big-ann dimensions.

use crate::VectorElement;

/// Squared L2 distance
#[inline]
pub fn l2_squared<T: VectorElement>(a: &[T], b: &[T]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let diff = x.to_f32() - y.to_f32();
        sum += diff * diff;
    }
    sum
}

/// Dot product
#[inline]
pub fn inner_product<T: VectorElement>(a: &[T], b: &[T]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        sum += x.to_f32() * y.to_f32();
    }
    sum
}
