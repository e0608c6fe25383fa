//! Anchor shape generation for one feature layer.
//!
//! A layer's anchors are fully described by a minimum size, an optional
//! maximum size and a list of aspect ratios, all in input-image pixels. The
//! generated list is positional: the decoder reads anchor `a` from slot `a`, so
//! the order produced here is the order in which the network emits boxes.
//!
//! Only one anchor is produced per configured ratio `r`; the reciprocal `1/r`
//! is not added implicitly. Configurations that want both must list both.

use crate::geometry::AnchorShape;
use crate::trace::{trace_event, trace_warn};
use crate::util::math::{geometric_mean, is_positive_finite};
use crate::util::{SsdBoxError, SsdBoxResult};

/// Returns how many anchors [`generate_anchor_shapes`] yields for a layer.
pub fn anchor_count(min_size: f32, max_size: f32, ratios: &[f32]) -> usize {
    1 + usize::from(max_size > min_size) + ratios.len()
}

/// Generates the ordered anchor shapes of one layer.
///
/// The output is, in order:
/// 1. the base square `min_size` anchor;
/// 2. when `max_size > min_size`, a square anchor of side
///    `sqrt(min_size * max_size)`;
/// 3. one anchor per ratio `r`, with height scaled by `1/sqrt(r)` and width
///    by `sqrt(r)`.
///
/// Heights are divided by `image_height` and widths by `image_width`.
pub fn generate_anchor_shapes(
    image_height: usize,
    image_width: usize,
    min_size: f32,
    max_size: f32,
    ratios: &[f32],
) -> SsdBoxResult<Vec<AnchorShape>> {
    if image_height == 0 || image_width == 0 {
        return Err(SsdBoxError::InvalidDimensions {
            height: image_height,
            width: image_width,
            context: "image",
        });
    }
    if !is_positive_finite(min_size) {
        return Err(SsdBoxError::InvalidAnchorConfig {
            reason: "min_size must be finite and > 0",
        });
    }
    if !max_size.is_finite() {
        return Err(SsdBoxError::InvalidAnchorConfig {
            reason: "max_size must be finite",
        });
    }
    if ratios.iter().any(|&r| !is_positive_finite(r)) {
        return Err(SsdBoxError::InvalidAnchorConfig {
            reason: "aspect ratios must be finite and > 0",
        });
    }

    if max_size > 0.0 && max_size <= min_size {
        trace_warn!(
            min_size,
            max_size,
            "max_size does not exceed min_size, intermediate anchor skipped"
        );
    }

    let img_h = image_height as f32;
    let img_w = image_width as f32;
    let mut shapes = Vec::with_capacity(anchor_count(min_size, max_size, ratios));

    shapes.push(AnchorShape::new(min_size / img_h, min_size / img_w));

    if max_size > min_size {
        let side = geometric_mean(min_size, max_size);
        shapes.push(AnchorShape::new(side / img_h, side / img_w));
    }

    for &ratio in ratios {
        let sqrt_ratio = ratio.sqrt();
        shapes.push(AnchorShape::new(
            min_size / img_h / sqrt_ratio,
            min_size / img_w * sqrt_ratio,
        ));
    }

    trace_event!("anchor_shapes", count = shapes.len());
    Ok(shapes)
}
