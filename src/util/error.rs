//! Error types for ssdbox.

use thiserror::Error;

/// Result alias for ssdbox operations.
pub type SsdBoxResult<T> = std::result::Result<T, SsdBoxError>;

/// Errors reported when a call's preconditions do not hold.
///
/// Every operation validates its inputs before doing any work, so an error
/// means no buffer was touched.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SsdBoxError {
    /// A feature map or image has a zero-sized axis.
    #[error("invalid dimensions {height}x{width} for {context}")]
    InvalidDimensions {
        height: usize,
        width: usize,
        context: &'static str,
    },
    /// A flat buffer does not have the length implied by its logical shape.
    #[error("{context} buffer has {got} elements, expected {expected}")]
    BufferSizeMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// Decoding was requested with no anchor shapes.
    #[error("anchor shape list is empty")]
    EmptyAnchors,
    /// More candidates were requested than there are anchors.
    #[error("top_k {top_k} exceeds anchor count {anchor_count}")]
    TopKTooLarge { top_k: usize, anchor_count: usize },
    /// Anchor size or ratio configuration is unusable.
    #[error("invalid anchor configuration: {reason}")]
    InvalidAnchorConfig { reason: &'static str },
    /// A prior scaling factor is not a finite positive number.
    #[error("prior scaling channel {channel} is {value}, expected finite and > 0")]
    InvalidPriorScaling { channel: usize, value: f32 },
    /// The overlap threshold is outside `[0, 1]` or not finite.
    #[error("overlap threshold {0} must lie in [0, 1]")]
    InvalidThreshold(f32),
    /// The sub-cell center offset is not finite.
    #[error("center offset {0} is not finite")]
    InvalidOffset(f32),
}
