//! Candidate ranking and overlap suppression.
//!
//! Includes score ranking with deterministic tie-breaking and Top-K NMS over
//! decoded boxes.

pub mod nms;
pub mod topk;
