//! Turns a multitouch touchpad into a virtual racing controller.
//!
//! The left half of the pad is a steering wheel driven by circular finger
//! motion, the right half is an H-pattern shifter, and two right fingers
//! moved up or down work the throttle.
//!
//! ```text
//! TouchSource ──► SlotTracker ──► drive::process_frame ──► VirtualPad
//!  (samples)      (contacts)      (steer / gear / throttle)  (frames)
//! ```

pub mod bridge;
pub mod config;
pub mod drive;
pub mod output;
pub mod rate_limiter;
pub mod snapshot;
pub mod touch;
