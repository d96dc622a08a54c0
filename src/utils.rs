//! Utilities module.

use num_traits::{cast, Float};

use crate::error::{Result, SerializeError};

/// Fast floating point minimum.  This function matches the semantics of
///
/// ```no_compile
/// if x < y { x } else { y }
/// ```
///
/// which has efficient instruction sequences on many platforms (1 instruction on x86).
/// Unlike `f32::min` it propagates a NaN in `y`, which is what the bounding volume
/// validation relies on to catch poisoned boxes.
#[inline(always)]
pub fn fast_min<T: Float>(x: T, y: T) -> T {
    if x < y {
        x
    } else {
        y
    }
}

/// Fast floating point maximum. See [`fast_min`] for the NaN semantics.
#[inline(always)]
pub fn fast_max<T: Float>(x: T, y: T) -> T {
    if x > y {
        x
    } else {
        y
    }
}

/// Converts a host side index or count into the signed 32 bit integer the kernels read.
pub fn to_wire_index(index: usize) -> Result<i32> {
    cast::<usize, i32>(index).ok_or(SerializeError::IndexOverflow(index))
}

/// Returns `Ok(value)` if `value` is finite, otherwise names the offending `component`.
pub fn ensure_finite(component: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SerializeError::InvalidBoundingVolume { component, value })
    }
}
