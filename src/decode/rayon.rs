//! Rayon-parallel decoding (feature-gated).
//!
//! Rows of the feature map are independent, so the buffer is split into
//! disjoint row chunks and each chunk is decoded on the pool. The per-entry
//! arithmetic is shared with the sequential path, so results are bit-identical.

use crate::decode::{decode_row, validate, FeatureShape, ImageShape};
use crate::geometry::{AnchorShape, PriorScaling};
use crate::trace::trace_span;
use crate::util::SsdBoxResult;
use rayon::prelude::*;

/// Row-parallel variant of [`decode_boxes`](crate::decode::decode_boxes).
#[allow(clippy::too_many_arguments)]
pub fn decode_boxes_par(
    buffer: &mut [f32],
    feature: FeatureShape,
    image: ImageShape,
    step: usize,
    anchors: &[AnchorShape],
    scaling: PriorScaling,
    offset: f32,
) -> SsdBoxResult<()> {
    let grid = validate(buffer.len(), feature, image, step, anchors, &scaling, offset)?;
    let _span = trace_span!(
        "decode_boxes_par",
        rows = feature.height,
        cols = feature.width,
        anchors = anchors.len()
    )
    .entered();

    buffer
        .par_chunks_exact_mut(grid.row_len)
        .enumerate()
        .for_each(|(row, data)| decode_row(data, row, &grid, anchors, &scaling));

    Ok(())
}
