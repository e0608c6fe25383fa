//! Per-layer configuration bundle.
//!
//! A multi-scale detector runs the anchor, decode and selection steps once per
//! output layer, each with its own parameters. `LayerConfig` groups those
//! parameters and checks them up front so a misconfigured layer fails before
//! any buffer is touched.

use crate::anchor::{anchor_count, generate_anchor_shapes};
use crate::candidate::nms::NmsConfig;
use crate::decode::{FeatureShape, ImageShape};
use crate::geometry::{AnchorShape, PriorScaling};
use crate::util::math::{checked_volume, is_positive_finite};
use crate::util::{SsdBoxError, SsdBoxResult};

/// Anchor, decoding and selection parameters for one feature layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerConfig {
    /// Base anchor size in input pixels.
    pub min_size: f32,
    /// Upper anchor size; values `<= min_size` disable the intermediate anchor.
    pub max_size: f32,
    /// Aspect ratios, one anchor each.
    pub ratios: Vec<f32>,
    /// Layer stride in pixels, `0` to derive it from the feature map height.
    pub step: usize,
    /// Sub-cell position of the prior center.
    pub offset: f32,
    pub prior_scaling: PriorScaling,
    pub nms: NmsConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            min_size: 30.0,
            max_size: 60.0,
            ratios: vec![2.0],
            step: 0,
            offset: 0.5,
            prior_scaling: PriorScaling::default(),
            nms: NmsConfig::default(),
        }
    }
}

impl LayerConfig {
    /// Checks everything that can be checked without the layer's buffers.
    pub fn validate(&self) -> SsdBoxResult<()> {
        if !is_positive_finite(self.min_size) {
            return Err(SsdBoxError::InvalidAnchorConfig {
                reason: "min_size must be finite and > 0",
            });
        }
        if !self.max_size.is_finite() {
            return Err(SsdBoxError::InvalidAnchorConfig {
                reason: "max_size must be finite",
            });
        }
        if self.ratios.iter().any(|&r| !is_positive_finite(r)) {
            return Err(SsdBoxError::InvalidAnchorConfig {
                reason: "aspect ratios must be finite and > 0",
            });
        }
        if !self.offset.is_finite() {
            return Err(SsdBoxError::InvalidOffset(self.offset));
        }
        if !(0.0..=1.0).contains(&self.nms.iou_threshold) {
            return Err(SsdBoxError::InvalidThreshold(self.nms.iou_threshold));
        }
        self.prior_scaling.validate()
    }

    /// Number of anchors per feature-map cell.
    pub fn anchors_per_cell(&self) -> usize {
        anchor_count(self.min_size, self.max_size, &self.ratios)
    }

    /// Generates this layer's anchor shapes for `image`.
    pub fn anchor_shapes(&self, image: ImageShape) -> SsdBoxResult<Vec<AnchorShape>> {
        generate_anchor_shapes(
            image.height,
            image.width,
            self.min_size,
            self.max_size,
            &self.ratios,
        )
    }

    /// Total anchor instances `H * W * A` for a feature map.
    pub fn instance_count(&self, feature: FeatureShape) -> SsdBoxResult<usize> {
        checked_volume(&[feature.height, feature.width, self.anchors_per_cell()]).ok_or(
            SsdBoxError::InvalidDimensions {
                height: feature.height,
                width: feature.width,
                context: "feature map",
            },
        )
    }
}
