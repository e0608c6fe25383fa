//! Box, anchor and scaling types in normalized image coordinates.
//!
//! All coordinates are fractions of the image: the y axis is divided by the
//! image height and the x axis by the image width. Flat buffers store boxes as
//! four consecutive `f32` values; the typed wrappers here are views over that
//! layout and do not change it.

pub mod jaccard;

pub use jaccard::{jaccard_overlap, jaccard_overlap_slices};

use crate::util::math::is_positive_finite;
use crate::util::{SsdBoxError, SsdBoxResult};

/// Decoded box as `(ymin, xmin, ymax, xmax)` corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxCorners {
    pub ymin: f32,
    pub xmin: f32,
    pub ymax: f32,
    pub xmax: f32,
}

impl BoxCorners {
    /// Creates a box from its corners.
    pub fn new(ymin: f32, xmin: f32, ymax: f32, xmax: f32) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    /// Reads a box from the first four elements of `values`.
    ///
    /// Returns `None` when fewer than four values are available.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        match values {
            [ymin, xmin, ymax, xmax, ..] => Some(Self::new(*ymin, *xmin, *ymax, *xmax)),
            _ => None,
        }
    }

    /// Returns the corners in buffer order.
    pub fn to_array(self) -> [f32; 4] {
        [self.ymin, self.xmin, self.ymax, self.xmax]
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    /// Signed area; negative for inverted boxes.
    pub fn area(&self) -> f32 {
        self.height() * self.width()
    }

    /// Converts to center form without clamping.
    pub fn to_center(self) -> BoxCenter {
        BoxCenter {
            cy: 0.5 * (self.ymin + self.ymax),
            cx: 0.5 * (self.xmin + self.xmax),
            h: self.height(),
            w: self.width(),
        }
    }
}

/// Box in center form `(cy, cx, h, w)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxCenter {
    pub cy: f32,
    pub cx: f32,
    pub h: f32,
    pub w: f32,
}

impl BoxCenter {
    /// Converts to corner form without clamping.
    pub fn to_corners(self) -> BoxCorners {
        let half_h = self.h / 2.0;
        let half_w = self.w / 2.0;
        BoxCorners::new(
            self.cy - half_h,
            self.cx - half_w,
            self.cy + half_h,
            self.cx + half_w,
        )
    }
}

/// Prior size of one anchor as fractions of the image height and width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorShape {
    pub height: f32,
    pub width: f32,
}

impl AnchorShape {
    pub fn new(height: f32, width: f32) -> Self {
        Self { height, width }
    }
}

/// Per-channel multipliers for the `(cy, cx, h, w)` regression outputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorScaling(pub [f32; 4]);

impl PriorScaling {
    /// Creates a scaling vector after checking every channel is finite and > 0.
    pub fn new(factors: [f32; 4]) -> SsdBoxResult<Self> {
        let scaling = Self(factors);
        scaling.validate()?;
        Ok(scaling)
    }

    /// Checks every channel is finite and strictly positive.
    pub fn validate(&self) -> SsdBoxResult<()> {
        for (channel, &value) in self.0.iter().enumerate() {
            if !is_positive_finite(value) {
                return Err(SsdBoxError::InvalidPriorScaling { channel, value });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn cy(&self) -> f32 {
        self.0[0]
    }

    #[inline]
    pub fn cx(&self) -> f32 {
        self.0[1]
    }

    #[inline]
    pub fn h(&self) -> f32 {
        self.0[2]
    }

    #[inline]
    pub fn w(&self) -> f32 {
        self.0[3]
    }
}

impl Default for PriorScaling {
    fn default() -> Self {
        Self([0.1, 0.1, 0.2, 0.2])
    }
}
