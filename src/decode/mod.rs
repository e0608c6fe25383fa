//! Anchor-relative decoding of regression output into corner boxes.
//!
//! A layer's localization buffer is a flat `[H][W][A][4]` row-major slice of
//! `(cy, cx, h, w)` regression values. Decoding rewrites each entry in place
//! into clamped `(ymin, xmin, ymax, xmax)` corners, so the caller's buffer is
//! reused as the output and nothing is allocated.
//!
//! For cell `(h, w)` and anchor `(dh, dw)` the prior center is
//! `((h + offset) * step_scale / img_h, (w + offset) * step_scale / img_w)`,
//! and the decoded box is
//!
//! ```text
//! g_cy = prior_cy + r0 * dh * s0      g_h = exp(r2 * dh * s2)
//! g_cx = prior_cx + r1 * dw * s1      g_w = exp(r3 * dw * s3)
//! ```
//!
//! The corners `g_c ∓ g_size / 2` are clamped to `[0, 1]`. `step_scale` is
//! the layer stride, or `img_h / H` when the stride is zero; the derived
//! stride is taken from the vertical axes and applied to both.

#[cfg(feature = "rayon")]
pub mod rayon;

use crate::geometry::{AnchorShape, BoxCenter, PriorScaling};
use crate::trace::{trace_event, trace_span};
use crate::util::math::checked_volume;
use crate::util::{SsdBoxError, SsdBoxResult};

/// Spatial size of a feature map in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureShape {
    pub height: usize,
    pub width: usize,
}

impl FeatureShape {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

/// Size of the network input image in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

/// Validated per-call decoding geometry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodeGrid {
    img_h: f32,
    img_w: f32,
    step_scale: f32,
    offset: f32,
    /// Number of floats covering one feature-map row.
    pub(crate) row_len: usize,
}

impl DecodeGrid {
    pub(crate) fn new(
        feature: FeatureShape,
        image: ImageShape,
        step: usize,
        offset: f32,
        anchor_count: usize,
    ) -> SsdBoxResult<Self> {
        if feature.height == 0 || feature.width == 0 {
            return Err(SsdBoxError::InvalidDimensions {
                height: feature.height,
                width: feature.width,
                context: "feature map",
            });
        }
        if image.height == 0 || image.width == 0 {
            return Err(SsdBoxError::InvalidDimensions {
                height: image.height,
                width: image.width,
                context: "image",
            });
        }
        if !offset.is_finite() {
            return Err(SsdBoxError::InvalidOffset(offset));
        }
        let row_len = checked_volume(&[feature.width, anchor_count, 4]).ok_or(
            SsdBoxError::InvalidDimensions {
                height: feature.height,
                width: feature.width,
                context: "feature map",
            },
        )?;

        let img_h = image.height as f32;
        let img_w = image.width as f32;
        let step_scale = if step == 0 {
            img_h / feature.height as f32
        } else {
            step as f32
        };

        Ok(Self {
            img_h,
            img_w,
            step_scale,
            offset,
            row_len,
        })
    }

    #[inline]
    fn prior_cy(&self, row: usize) -> f32 {
        (row as f32 + self.offset) * self.step_scale / self.img_h
    }

    #[inline]
    fn prior_cx(&self, col: usize) -> f32 {
        (col as f32 + self.offset) * self.step_scale / self.img_w
    }
}

/// Decodes a layer's localization buffer in place.
///
/// `buffer` must hold exactly `H * W * anchors.len() * 4` values. All inputs
/// are validated before the first write, so on error the buffer is unchanged.
#[allow(clippy::too_many_arguments)]
pub fn decode_boxes(
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
        "decode_boxes",
        rows = feature.height,
        cols = feature.width,
        anchors = anchors.len()
    )
    .entered();

    for (row, data) in buffer.chunks_exact_mut(grid.row_len).enumerate() {
        decode_row(data, row, &grid, anchors, &scaling);
    }

    trace_event!("decoded_boxes", count = buffer.len() / 4);
    Ok(())
}

/// Returns the prior center `(cy, cx)` of cell `(row, col)`.
///
/// This is the point regression offsets are measured from; it is exposed for
/// building synthetic regression targets with [`encode_box`].
pub fn prior_center(
    feature: FeatureShape,
    image: ImageShape,
    step: usize,
    offset: f32,
    row: usize,
    col: usize,
) -> SsdBoxResult<(f32, f32)> {
    let grid = DecodeGrid::new(feature, image, step, offset, 1)?;
    Ok((grid.prior_cy(row), grid.prior_cx(col)))
}

/// Inverse of the per-entry decode for a box that needs no clamping.
///
/// Returns the `(cy, cx, h, w)` regression values that decode back to
/// `target` for the given prior center and anchor. `target.h` and `target.w`
/// must be positive for the logarithm to be finite.
pub fn encode_box(
    prior: (f32, f32),
    anchor: AnchorShape,
    scaling: PriorScaling,
    target: BoxCenter,
) -> [f32; 4] {
    let (prior_cy, prior_cx) = prior;
    [
        (target.cy - prior_cy) / (anchor.height * scaling.cy()),
        (target.cx - prior_cx) / (anchor.width * scaling.cx()),
        target.h.ln() / (anchor.height * scaling.h()),
        target.w.ln() / (anchor.width * scaling.w()),
    ]
}

pub(crate) fn validate(
    len: usize,
    feature: FeatureShape,
    image: ImageShape,
    step: usize,
    anchors: &[AnchorShape],
    scaling: &PriorScaling,
    offset: f32,
) -> SsdBoxResult<DecodeGrid> {
    if anchors.is_empty() {
        return Err(SsdBoxError::EmptyAnchors);
    }
    scaling.validate()?;
    let grid = DecodeGrid::new(feature, image, step, offset, anchors.len())?;
    let expected = grid
        .row_len
        .checked_mul(feature.height)
        .unwrap_or(usize::MAX);
    if len != expected {
        return Err(SsdBoxError::BufferSizeMismatch {
            expected,
            got: len,
            context: "localization",
        });
    }
    Ok(grid)
}

/// Decodes one feature-map row of `W * A` entries.
pub(crate) fn decode_row(
    data: &mut [f32],
    row: usize,
    grid: &DecodeGrid,
    anchors: &[AnchorShape],
    scaling: &PriorScaling,
) {
    let prior_cy = grid.prior_cy(row);
    let cell_len = anchors.len() * 4;
    for (col, cell) in data.chunks_exact_mut(cell_len).enumerate() {
        let prior_cx = grid.prior_cx(col);
        for (entry, anchor) in cell.chunks_exact_mut(4).zip(anchors) {
            decode_entry(entry, prior_cy, prior_cx, anchor, scaling);
        }
    }
}

#[inline]
fn decode_entry(
    entry: &mut [f32],
    prior_cy: f32,
    prior_cx: f32,
    anchor: &AnchorShape,
    scaling: &PriorScaling,
) {
    let dh = anchor.height;
    let dw = anchor.width;
    let g_cy = prior_cy + entry[0] * dh * scaling.cy();
    let g_cx = prior_cx + entry[1] * dw * scaling.cx();
    let g_h = (entry[2] * dh * scaling.h()).exp();
    let g_w = (entry[3] * dw * scaling.w()).exp();

    // Both sides are clamped: a large center offset can push `ymin` past 1 or
    // `ymax` below 0. `max`/`min` rather than `clamp` so an `inf - inf` NaN
    // lands on a bound instead of being written out.
    entry[0] = (g_cy - g_h / 2.0).max(0.0).min(1.0);
    entry[1] = (g_cx - g_w / 2.0).max(0.0).min(1.0);
    entry[2] = (g_cy + g_h / 2.0).max(0.0).min(1.0);
    entry[3] = (g_cx + g_w / 2.0).max(0.0).min(1.0);
}
