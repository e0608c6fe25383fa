//! Numeric helpers shared by anchor generation, decoding and selection.

/// Multiplies buffer extents, returning `None` on overflow.
pub(crate) fn checked_volume(extents: &[usize]) -> Option<usize> {
    extents
        .iter()
        .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
}

/// Returns true for finite values strictly greater than zero.
pub(crate) fn is_positive_finite(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// Geometric mean of two sizes, used for the intermediate square anchor.
pub(crate) fn geometric_mean(a: f32, b: f32) -> f32 {
    (a * b).sqrt()
}
