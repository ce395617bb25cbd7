//! Touch input subsystem
//!
//! Turns the raw multitouch sample stream into a per-frame view of contacts:
//!
//! 1. [`source`] - Where samples come from (device boundary, trace replay)
//!    and [`evdev_source`] for a live kernel device
//! 2. [`sample`] - Raw sample type and its decoding
//! 3. [`slot_tracker`] - Authoritative per-slot contact table
//!
//! # Architecture
//!
//! ```text
//! TouchSource ──► TouchSample ──► SlotTracker ──► ContactSnapshot
//!                 (decoded)       (per slot)      (at frame boundary)
//! ```

pub mod codes;
pub mod evdev_source;
pub mod sample;
pub mod slot_tracker;
pub mod source;
pub mod surface;

pub use evdev_source::EvdevSource;
pub use sample::{SampleEvent, SampleKind, TouchSample};
pub use slot_tracker::{Contact, ContactSnapshot, SlotTracker, TouchPoint};
pub use source::{ReplaySource, SourceError, TouchSource};
pub use surface::{AxisRange, Side, SurfaceGeometry, SurfaceInfo};
