//! Top-K selection with overlap suppression over decoded boxes.
//!
//! Candidates are ranked by score and the best `top_k` are visited in rank
//! order. The first is always kept. Each later candidate is dropped when its
//! overlap with an earlier candidate exceeds the threshold. Which earlier
//! candidates count is controlled by [`SuppressionMode`]: by default every
//! earlier-ranked candidate does, including ones that were themselves
//! suppressed. `SuppressionMode::KeptOnly` gives classic greedy NMS.

use crate::candidate::topk::rank_by_score;
use crate::geometry::{jaccard_overlap, BoxCorners};
use crate::trace::{trace_event, trace_span};
use crate::util::math::checked_volume;
use crate::util::{SsdBoxError, SsdBoxResult};

/// Overlap above which a lower-ranked candidate is suppressed.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Which earlier candidates a new candidate is compared against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Compare against every earlier-ranked candidate, kept or not.
    #[default]
    AllRanked,
    /// Compare only against candidates that were kept (classic greedy NMS).
    KeptOnly,
}

/// Selection parameters for one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsConfig {
    /// Number of best-scoring candidates considered.
    pub top_k: usize,
    /// Overlap strictly above this value suppresses a candidate.
    pub iou_threshold: f32,
    pub suppression: SuppressionMode,
}

impl NmsConfig {
    /// Default threshold and suppression rule with the given `top_k`.
    pub fn with_top_k(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            top_k: 200,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            suppression: SuppressionMode::AllRanked,
        }
    }
}

/// A kept box with its confidence score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub score: f32,
    pub bbox: BoxCorners,
}

/// Kept scores and flattened boxes, in descending score order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NmsOutput {
    pub scores: Vec<f32>,
    /// Four values per kept box, `(ymin, xmin, ymax, xmax)`.
    pub boxes: Vec<f32>,
}

impl NmsOutput {
    fn with_capacity(n: usize) -> Self {
        Self {
            scores: Vec::with_capacity(n),
            boxes: Vec::with_capacity(n * 4),
        }
    }

    fn push(&mut self, score: f32, bbox: &BoxCorners) {
        self.scores.push(score);
        self.boxes.extend_from_slice(&bbox.to_array());
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates kept entries as typed detections.
    pub fn detections(&self) -> impl Iterator<Item = Detection> + '_ {
        self.scores
            .iter()
            .zip(self.boxes.chunks_exact(4))
            .map(|(&score, b)| Detection {
                score,
                bbox: BoxCorners::new(b[0], b[1], b[2], b[3]),
            })
    }
}

/// Selects the best `top_k` boxes and suppresses overlaps above 0.45.
///
/// `scores` holds `anchor_count` values and `localization` holds
/// `anchor_count * 4` decoded corner values in the same order.
pub fn select_top_k_with_nms(
    scores: &[f32],
    localization: &[f32],
    anchor_count: usize,
    top_k: usize,
) -> SsdBoxResult<NmsOutput> {
    select_top_k_with_nms_config(
        scores,
        localization,
        anchor_count,
        NmsConfig::with_top_k(top_k),
    )
}

/// [`select_top_k_with_nms`] with an explicit threshold and suppression rule.
pub fn select_top_k_with_nms_config(
    scores: &[f32],
    localization: &[f32],
    anchor_count: usize,
    cfg: NmsConfig,
) -> SsdBoxResult<NmsOutput> {
    validate(scores, localization, anchor_count, &cfg)?;
    let _span = trace_span!("select_top_k_with_nms", anchors = anchor_count, top_k = cfg.top_k)
        .entered();

    let ranked = rank_by_score(scores, cfg.top_k);
    let boxes: Vec<BoxCorners> = ranked
        .iter()
        .map(|c| box_at(localization, c.index))
        .collect();

    let mut out = NmsOutput::with_capacity(ranked.len());
    let mut kept: Vec<usize> = Vec::with_capacity(ranked.len());

    for (rank, candidate) in ranked.iter().enumerate() {
        let bbox = &boxes[rank];
        let suppressed = match cfg.suppression {
            SuppressionMode::AllRanked => boxes[..rank]
                .iter()
                .any(|earlier| jaccard_overlap(bbox, earlier) > cfg.iou_threshold),
            SuppressionMode::KeptOnly => kept
                .iter()
                .any(|&earlier| jaccard_overlap(bbox, &boxes[earlier]) > cfg.iou_threshold),
        };
        if !suppressed {
            kept.push(rank);
            out.push(candidate.score, bbox);
        }
    }

    trace_event!("nms_kept", ranked = ranked.len(), kept = out.len());
    Ok(out)
}

fn validate(
    scores: &[f32],
    localization: &[f32],
    anchor_count: usize,
    cfg: &NmsConfig,
) -> SsdBoxResult<()> {
    if scores.len() != anchor_count {
        return Err(SsdBoxError::BufferSizeMismatch {
            expected: anchor_count,
            got: scores.len(),
            context: "scores",
        });
    }
    let expected = checked_volume(&[anchor_count, 4]).unwrap_or(usize::MAX);
    if localization.len() != expected {
        return Err(SsdBoxError::BufferSizeMismatch {
            expected,
            got: localization.len(),
            context: "localization",
        });
    }
    if cfg.top_k > anchor_count {
        return Err(SsdBoxError::TopKTooLarge {
            top_k: cfg.top_k,
            anchor_count,
        });
    }
    if !(0.0..=1.0).contains(&cfg.iou_threshold) {
        return Err(SsdBoxError::InvalidThreshold(cfg.iou_threshold));
    }
    Ok(())
}

#[inline]
fn box_at(localization: &[f32], index: usize) -> BoxCorners {
    let start = index * 4;
    BoxCorners::new(
        localization[start],
        localization[start + 1],
        localization[start + 2],
        localization[start + 3],
    )
}

#[cfg(test)]
mod tests {
    use super::{
        select_top_k_with_nms, select_top_k_with_nms_config, NmsConfig, SuppressionMode,
    };
    use crate::util::SsdBoxError;

    #[test]
    fn first_keep_uses_top_ranked_box() {
        let scores = [0.1, 0.9];
        let loc = [0.0, 0.0, 0.1, 0.1, 0.5, 0.5, 0.9, 0.9];
        let out = select_top_k_with_nms(&scores, &loc, 2, 1).unwrap();
        assert_eq!(out.scores, vec![0.9]);
        assert_eq!(out.boxes, vec![0.5, 0.5, 0.9, 0.9]);
    }

    #[test]
    fn overlap_exactly_at_threshold_is_kept() {
        // IoU of these two boxes is 0.5; a 0.5 threshold only suppresses above it.
        let scores = [0.9, 0.8];
        let loc = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.5];
        let cfg = NmsConfig {
            top_k: 2,
            iou_threshold: 0.5,
            ..NmsConfig::default()
        };
        let out = select_top_k_with_nms_config(&scores, &loc, 2, cfg).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn zero_top_k_returns_empty() {
        let out = select_top_k_with_nms(&[0.3], &[0.0, 0.0, 1.0, 1.0], 1, 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn rejects_top_k_above_anchor_count() {
        let err = select_top_k_with_nms(&[0.3], &[0.0, 0.0, 1.0, 1.0], 1, 2)
            .err()
            .unwrap();
        assert_eq!(
            err,
            SsdBoxError::TopKTooLarge {
                top_k: 2,
                anchor_count: 1
            }
        );
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let err = select_top_k_with_nms(&[0.3, 0.2], &[0.0, 0.0, 1.0, 1.0], 2, 1)
            .err()
            .unwrap();
        assert_eq!(
            err,
            SsdBoxError::BufferSizeMismatch {
                expected: 8,
                got: 4,
                context: "localization",
            }
        );
        let err = select_top_k_with_nms(&[0.3], &[0.0, 0.0, 1.0, 1.0], 2, 1)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SsdBoxError::BufferSizeMismatch {
                context: "scores",
                ..
            }
        ));
    }

    #[test]
    fn rejects_threshold_outside_unit_range() {
        let cfg = NmsConfig {
            top_k: 1,
            iou_threshold: 1.5,
            suppression: SuppressionMode::KeptOnly,
        };
        let err = select_top_k_with_nms_config(&[0.3], &[0.0, 0.0, 1.0, 1.0], 1, cfg)
            .err()
            .unwrap();
        assert_eq!(err, SsdBoxError::InvalidThreshold(1.5));
    }

    #[test]
    fn detections_view_matches_flat_output() {
        let scores = [0.2, 0.7];
        let loc = [0.0, 0.0, 0.2, 0.2, 0.6, 0.6, 0.8, 0.8];
        let out = select_top_k_with_nms(&scores, &loc, 2, 2).unwrap();
        let dets: Vec<_> = out.detections().collect();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].score, 0.7);
        assert_eq!(dets[0].bbox.to_array(), [0.6, 0.6, 0.8, 0.8]);
        assert_eq!(dets[1].bbox.ymax, 0.2);
    }
}
