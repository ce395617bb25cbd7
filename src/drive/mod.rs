//! Frame processing: contacts in, controller frame out.
//!
//! Each estimator keeps the little state it needs between frames in its own
//! struct. [`DriveState`] bundles them and [`process_frame`] advances all of
//! them by one input frame, so the whole pipeline can be driven from a test
//! without a device.
//!
//! ```text
//! ContactSnapshot ──┬──► SteeringState ──┐
//!                   ├──► GearState ──────┼──► synthesize ──► OutputFrame
//!                   └──► ThrottleState ──┘
//! ```

pub mod gear;
pub mod steering;
pub mod throttle;

use std::time::Duration;

use crate::config::DriveConfig;
use crate::output::{synthesize, DriveValues, OutputFrame};
use crate::touch::{ContactSnapshot, Side, SurfaceGeometry, TouchPoint};

pub use gear::{Gear, GearReading, GearState};
pub use steering::{Steering, SteeringState};
pub use throttle::ThrottleState;

/// State carried from one frame to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveState {
    pub steering: SteeringState,
    pub gear: GearState,
    pub throttle: ThrottleState,
}

/// Contacts that started on the right half and are still on it, in slot
/// order.
pub fn right_contacts(contacts: &ContactSnapshot, geometry: &SurfaceGeometry) -> Vec<TouchPoint> {
    contacts
        .points()
        .iter()
        .filter(|p| p.side == Side::Right && f64::from(p.x) >= geometry.center_x)
        .copied()
        .collect()
}

/// Advances every estimator by one frame and builds the output frame.
pub fn process_frame(
    state: &mut DriveState,
    contacts: &ContactSnapshot,
    geometry: &SurfaceGeometry,
    config: &DriveConfig,
    now: Duration,
    aux_click: bool,
) -> OutputFrame {
    let steering = state.steering.update(contacts, geometry, config);

    let right = right_contacts(contacts, geometry);
    let reading = state.gear.update(&right, geometry, config, now);
    state.throttle.update(&right, reading.locked, geometry, config);

    let values = DriveValues {
        steering,
        gear: reading.gear,
        throttle: state.throttle.output(config),
        aux_click,
    };
    synthesize(now, &values, contacts, &right, geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::AXIS_MAX;
    use crate::touch::AxisRange;

    // Left half is 500 x 500 so steering angles need no aspect correction
    fn geometry() -> SurfaceGeometry {
        SurfaceGeometry::new(AxisRange::new(0, 1000), AxisRange::new(0, 500))
    }

    fn contact(slot: usize, x: i32, y: i32, side: Side) -> TouchPoint {
        TouchPoint {
            slot,
            tracking_id: Some(slot as i32),
            x,
            y,
            side,
        }
    }

    fn frame(points: Vec<TouchPoint>) -> ContactSnapshot {
        ContactSnapshot::new(points)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // Right finger at normalized (u, v) on the right half
    fn right_at(slot: usize, u: f64, v: f64) -> TouchPoint {
        contact(
            slot,
            (500.0 + u * 500.0).round() as i32,
            (v * 500.0).round() as i32,
            Side::Right,
        )
    }

    fn steer_at(angle: f64) -> TouchPoint {
        let g = geometry();
        contact(
            0,
            (g.steer_center_x + 200.0 * angle.cos()).round() as i32,
            (g.center_y + 200.0 * angle.sin()).round() as i32,
            Side::Left,
        )
    }

    #[test]
    fn right_contacts_require_right_side_and_position() {
        let g = geometry();
        let contacts = frame(vec![
            contact(0, 700, 100, Side::Right),
            contact(1, 400, 100, Side::Right),
            contact(2, 800, 100, Side::Left),
            contact(3, 500, 100, Side::Right),
        ]);
        let slots: Vec<usize> = right_contacts(&contacts, &g).iter().map(|p| p.slot).collect();
        assert_eq!(slots, vec![0, 3]);
    }

    #[test]
    fn rotating_left_finger_steers_at_full_lock() {
        let mut state = DriveState::default();
        let config = DriveConfig::default();

        let first = process_frame(
            &mut state,
            &frame(vec![steer_at(0.0)]),
            &geometry(),
            &config,
            ms(0),
            false,
        );
        assert_eq!(first.steering, 0);
        assert!(first.buttons.active);
        assert!(first.buttons.left_present);

        let second = process_frame(
            &mut state,
            &frame(vec![steer_at(0.2)]),
            &geometry(),
            &config,
            ms(10),
            false,
        );
        assert_eq!(second.steering, AXIS_MAX);
    }

    #[test]
    fn held_right_finger_engages_first_gear() {
        let mut state = DriveState::default();
        let config = DriveConfig::default();
        let contacts = frame(vec![right_at(0, 0.1, 0.1)]);

        let mut out = OutputFrame::default();
        for t in (0..=130).step_by(10) {
            out = process_frame(&mut state, &contacts, &geometry(), &config, ms(t), false);
        }
        assert_eq!(out.gear, Gear::First);
        assert!(out.buttons.gear_first);
        assert!(out.buttons.right_present);
        assert!(!out.buttons.right_multi);
    }

    #[test]
    fn two_fingers_hold_gear_and_drive_throttle() {
        let mut state = DriveState {
            gear: GearState {
                last_gear: Gear::Second,
                pending_gear: Gear::Second,
                ..GearState::default()
            },
            ..DriveState::default()
        };
        let config = DriveConfig::default();

        let mut t = 0;
        let mut v = 0.9;
        let mut last_throttle = i32::MIN;
        while v > 0.05 {
            let contacts = frame(vec![right_at(0, 0.2, v), right_at(1, 0.8, v)]);
            let out = process_frame(&mut state, &contacts, &geometry(), &config, ms(t), false);
            assert_eq!(out.gear, Gear::Second);
            assert!(out.buttons.gear_second && out.buttons.right_multi);
            assert!(out.throttle >= last_throttle);
            last_throttle = out.throttle;
            t += 10;
            v -= 0.05;
        }
        assert_eq!(last_throttle, AXIS_MAX);

        // one finger lifts: throttle is held and gear stays during the grace
        let out = process_frame(
            &mut state,
            &frame(vec![right_at(0, 0.9, 0.9)]),
            &geometry(),
            &config,
            ms(t),
            false,
        );
        assert_eq!(out.throttle, AXIS_MAX);
        assert_eq!(out.gear, Gear::Second);
        assert!(!out.buttons.right_multi);
    }

    #[test]
    fn aux_click_is_passed_through() {
        let mut state = DriveState::default();
        let out = process_frame(
            &mut state,
            &ContactSnapshot::default(),
            &geometry(),
            &DriveConfig::default(),
            ms(0),
            true,
        );
        assert!(out.buttons.aux_click);
        assert!(!out.buttons.active);
        assert_eq!(out.gear, Gear::Neutral);
    }

    #[test]
    fn outputs_stay_in_range_under_noise() {
        let mut state = DriveState::default();
        let config = DriveConfig::default();
        for step in 0..500u64 {
            let n = step as f64;
            let mut points = vec![contact(
                0,
                ((n * 0.7).sin() * 600.0 + 250.0) as i32,
                ((n * 1.3).cos() * 400.0 + 250.0) as i32,
                Side::Left,
            )];
            for slot in 1..=(step % 4) as usize {
                points.push(contact(
                    slot,
                    ((n * 0.31 + slot as f64).sin() * 700.0 + 750.0) as i32,
                    ((n * 0.17 * slot as f64).cos() * 700.0 + 250.0) as i32,
                    Side::Right,
                ));
            }
            let out = process_frame(
                &mut state,
                &frame(points),
                &geometry(),
                &config,
                ms(step * 8),
                false,
            );
            for event in out.events() {
                assert!(event.value.abs() <= AXIS_MAX);
            }
            let gears = [
                out.buttons.gear_first,
                out.buttons.gear_second,
                out.buttons.gear_third,
                out.buttons.gear_fourth,
            ];
            assert!(gears.iter().filter(|g| **g).count() <= 1);
        }
    }
}
