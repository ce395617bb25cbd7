//! Rotary steering from the left half of the pad.
//!
//! The output is the angular velocity of the steering finger around the middle
//! of the left half, not its absolute angle. One continuous circular motion
//! therefore behaves like a wheel with unlimited travel.

use crate::config::DriveConfig;
use crate::touch::{ContactSnapshot, Side, SurfaceGeometry, TouchPoint};

/// Angular deltas below this many radians are treated as jitter.
pub const JITTER_THRESHOLD: f64 = 0.01;

/// Carries the previous frame's angle. `None` whenever there is no engaged
/// steering finger, so a new touch never produces a delta against a stale
/// angle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringState {
    pub last_angle: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Steering {
    /// Steering in `[-1, 1]`
    pub value: f64,
    /// A finger is outside the deadzone and driving the wheel
    pub active: bool,
}

impl SteeringState {
    pub fn update(
        &mut self,
        contacts: &ContactSnapshot,
        geometry: &SurfaceGeometry,
        config: &DriveConfig,
    ) -> Steering {
        let Some(finger) = steering_finger(contacts, geometry) else {
            self.last_angle = None;
            return Steering::default();
        };

        let dx = f64::from(finger.x) - geometry.steer_center_x;
        let dy = (f64::from(finger.y) - geometry.center_y) * geometry.aspect_correction();

        if dx.hypot(dy) <= config.steer_deadzone {
            self.last_angle = None;
            return Steering::default();
        }

        let angle = dy.atan2(dx);
        let value = match self.last_angle {
            Some(last) => {
                let mut delta = shortest_angle(angle - last);
                if delta.abs() < JITTER_THRESHOLD {
                    delta = 0.0;
                }
                (delta / config.steer_delta_scale).clamp(-1.0, 1.0)
            }
            None => 0.0,
        };
        self.last_angle = Some(angle);

        Steering {
            value,
            active: true,
        }
    }
}

// Lowest slot that started on the left and is still left of centre
fn steering_finger<'a>(
    contacts: &'a ContactSnapshot,
    geometry: &SurfaceGeometry,
) -> Option<&'a TouchPoint> {
    contacts
        .points()
        .iter()
        .find(|p| p.side == Side::Left && f64::from(p.x) < geometry.center_x)
}

/// Signed shortest difference, in `(-pi, pi]`.
fn shortest_angle(delta: f64) -> f64 {
    delta.sin().atan2(delta.cos())
}
