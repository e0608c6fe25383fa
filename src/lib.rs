//! SSDBox turns raw SSD-style detector regression output into final boxes.
//!
//! The crate provides four pure numeric steps, run once per output layer:
//! anchor shape generation, in-place box decoding, Jaccard overlap, and Top-K
//! selection with overlap suppression. All coordinates are normalized to the
//! input image. Optional parallel decoding is available via the `rayon`
//! feature, and spans/events via the `tracing` feature.

pub mod anchor;
pub mod candidate;
pub mod decode;
pub mod geometry;
pub mod layer;
mod trace;
pub mod util;

pub use anchor::{anchor_count, generate_anchor_shapes};
pub use candidate::nms::{
    select_top_k_with_nms, select_top_k_with_nms_config, Detection, NmsConfig, NmsOutput,
    SuppressionMode, DEFAULT_IOU_THRESHOLD,
};
pub use candidate::topk::{rank_by_score, RankedCandidate};
pub use decode::{decode_boxes, encode_box, prior_center, FeatureShape, ImageShape};
pub use geometry::{
    jaccard_overlap, jaccard_overlap_slices, AnchorShape, BoxCenter, BoxCorners, PriorScaling,
};
pub use layer::LayerConfig;
pub use util::{SsdBoxError, SsdBoxResult};

#[cfg(feature = "rayon")]
pub use decode::rayon::decode_boxes_par;
