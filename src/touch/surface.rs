//! Physical extent of the touch surface and the derived reference points the
//! estimators work with.

use serde::{Deserialize, Serialize};

/// Slot capacity used when a source does not report one.
pub const DEFAULT_SLOT_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Range width used as a divisor, never below 1.
    pub fn span(&self) -> f64 {
        (f64::from(self.max) - f64::from(self.min)).max(1.0)
    }

    pub fn center(&self) -> f64 {
        (f64::from(self.min) + f64::from(self.max)) / 2.0
    }
}

// What a touch source reports about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub x: AxisRange,
    pub y: AxisRange,
    pub slots: usize,
}

impl SurfaceInfo {
    pub fn new(x: AxisRange, y: AxisRange, slots: usize) -> Self {
        Self { x, y, slots }
    }
}

/// Which half of the surface a contact started on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    Left,
    Right,
    #[default]
    Unknown,
}

/// Reference points derived once from the axis ranges.
///
/// The surface is split at `center_x`: the left half steers, the right half
/// shifts and drives the throttle. Steering angles are measured around
/// `(steer_center_x, center_y)`, the middle of the left half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub x: AxisRange,
    pub y: AxisRange,
    pub center_x: f64,
    pub center_y: f64,
    pub steer_center_x: f64,
}

impl SurfaceGeometry {
    pub fn new(x: AxisRange, y: AxisRange) -> Self {
        let center_x = x.center();
        Self {
            x,
            y,
            center_x,
            center_y: y.center(),
            steer_center_x: (f64::from(x.min) + center_x) / 2.0,
        }
    }

    pub fn from_surface(info: &SurfaceInfo) -> Self {
        Self::new(info.x, info.y)
    }

    pub fn side_of(&self, x: i32) -> Side {
        if f64::from(x) < self.center_x {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Scales vertical deltas so a circle traced on a non-square pad reads as
    /// a circle around the steering centre.
    pub fn aspect_correction(&self) -> f64 {
        (self.center_x - f64::from(self.x.min)) / self.y.span()
    }

    fn left_span(&self) -> f64 {
        (self.center_x - f64::from(self.x.min)).max(1.0)
    }

    fn right_span(&self) -> f64 {
        (f64::from(self.x.max) - self.center_x).max(1.0)
    }

    /// Horizontal position within the left half, unclamped.
    pub fn left_u(&self, x: i32) -> f64 {
        (f64::from(x) - f64::from(self.x.min)) / self.left_span()
    }

    /// Horizontal position within the right half, unclamped.
    pub fn right_u(&self, x: i32) -> f64 {
        (f64::from(x) - self.center_x) / self.right_span()
    }

    /// Vertical position over the full height, unclamped. 0 is the top edge.
    pub fn v(&self, y: i32) -> f64 {
        (f64::from(y) - f64::from(self.y.min)) / self.y.span()
    }
}
