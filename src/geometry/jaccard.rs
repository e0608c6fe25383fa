//! Intersection-over-union for axis-aligned boxes.

use crate::geometry::BoxCorners;
use crate::util::{SsdBoxError, SsdBoxResult};

/// Computes the Jaccard overlap (IoU) of two corner-form boxes.
///
/// Intersection height and width are clamped to zero independently. When the
/// union is not strictly positive, which only happens for degenerate or
/// inverted boxes, the overlap is reported as `0.0` instead of NaN or infinity.
/// Inverted boxes are otherwise not guarded, so results above 1 are possible.
pub fn jaccard_overlap(a: &BoxCorners, b: &BoxCorners) -> f32 {
    let inter_h = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let inter_w = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let intersection = inter_h * inter_w;
    let union = a.area() + b.area() - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Slice form of [`jaccard_overlap`] over `(ymin, xmin, ymax, xmax)` entries.
///
/// Each slice must hold exactly four values.
pub fn jaccard_overlap_slices(a: &[f32], b: &[f32]) -> SsdBoxResult<f32> {
    Ok(jaccard_overlap(&box_from_entry(a)?, &box_from_entry(b)?))
}

fn box_from_entry(entry: &[f32]) -> SsdBoxResult<BoxCorners> {
    match entry {
        &[ymin, xmin, ymax, xmax] => Ok(BoxCorners::new(ymin, xmin, ymax, xmax)),
        _ => Err(SsdBoxError::BufferSizeMismatch {
            expected: 4,
            got: entry.len(),
            context: "box",
        }),
    }
}
