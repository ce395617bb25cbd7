//! Virtual controller output
//!
//! [`synthesize`] folds the per-frame drive values and the raw finger
//! positions into one [`OutputFrame`]. A frame is always complete: every axis
//! and every button has a value, and [`OutputFrame::events`] lists them as a
//! single batch terminated by a sync marker.
//!
//! ```text
//! Steering ─┐
//! Gear ─────┼──► synthesize ──► OutputFrame ──► VirtualPad (uinput, trace)
//! Throttle ─┘        ▲
//!          contacts ─┘
//! ```

pub mod pad;
pub mod uinput;

use std::time::Duration;

use crate::drive::gear::Gear;
use crate::drive::steering::Steering;
use crate::touch::codes::{
    ABS_HAT0X, ABS_HAT0Y, ABS_RX, ABS_RY, ABS_RZ, ABS_X, ABS_Y, ABS_Z, BTN_EAST, BTN_JOYSTICK,
    BTN_NORTH, BTN_SELECT, BTN_SOUTH, BTN_START, BTN_THUMBL, BTN_TR, BTN_WEST, EV_ABS, EV_KEY,
    EV_SYN, SYN_REPORT,
};
use crate::touch::{ContactSnapshot, SurfaceGeometry, TouchPoint};

pub use pad::{FanoutPad, FramePublisher, PadError, TracePad, VirtualPad};
pub use uinput::UinputPad;

/// Full-scale axis value
pub const AXIS_MAX: i32 = 32767;

/// Scales a value in `[-1, 1]` to the virtual axis range. Out-of-range input
/// is clamped first, so nothing outside `[-AXIS_MAX, AXIS_MAX]` is produced.
pub fn to_axis(value: f64) -> i32 {
    (value.clamp(-1.0, 1.0) * f64::from(AXIS_MAX)) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisPair {
    pub x: i32,
    pub y: i32,
}

impl AxisPair {
    /// Pair from normalized `[0, 1]` coordinates, centred so 0.5 maps to 0.
    pub fn from_normalized(u: f64, v: f64) -> Self {
        Self {
            x: to_axis(u.clamp(0.0, 1.0) * 2.0 - 1.0),
            y: to_axis(v.clamp(0.0, 1.0) * 2.0 - 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    pub active: bool,
    pub gear_first: bool,
    pub gear_second: bool,
    pub gear_third: bool,
    pub gear_fourth: bool,
    pub aux_click: bool,
    pub right_present: bool,
    pub left_present: bool,
    pub right_multi: bool,
}

impl Buttons {
    /// Button codes paired with their state, in emission order.
    pub fn codes(&self) -> [(u16, bool); 9] {
        [
            (BTN_JOYSTICK, self.active),
            (BTN_SOUTH, self.gear_first),
            (BTN_EAST, self.gear_second),
            (BTN_WEST, self.gear_third),
            (BTN_NORTH, self.gear_fourth),
            (BTN_SELECT, self.aux_click),
            (BTN_START, self.right_present),
            (BTN_THUMBL, self.left_present),
            (BTN_TR, self.right_multi),
        ]
    }

    /// Packed state, bit `n` set when the `n`-th button of [`Buttons::codes`]
    /// is pressed.
    pub fn bits(&self) -> u16 {
        self.codes()
            .iter()
            .enumerate()
            .filter(|(_, (_, pressed))| *pressed)
            .fold(0, |bits, (index, _)| bits | (1 << index))
    }
}

/// One write to the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl OutputEvent {
    fn axis(code: u16, value: i32) -> Self {
        Self {
            event_type: EV_ABS,
            code,
            value,
        }
    }

    fn button(code: u16, pressed: bool) -> Self {
        Self {
            event_type: EV_KEY,
            code,
            value: i32::from(pressed),
        }
    }
}

/// Derived values for one frame, before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveValues {
    pub steering: Steering,
    pub gear: Gear,
    /// Throttle after the neutral band, in `[-1, 1]`
    pub throttle: f64,
    pub aux_click: bool,
}

/// Everything the virtual device shows for one input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputFrame {
    /// Timestamp of the frame boundary that produced this frame
    pub time: Duration,
    pub gear: Gear,
    pub steering: i32,
    pub throttle: i32,
    pub right_primary: AxisPair,
    pub right_secondary: AxisPair,
    pub left: AxisPair,
    pub buttons: Buttons,
}

impl OutputFrame {
    /// The frame as device writes: 8 axes, 9 buttons, then `SYN_REPORT`.
    pub fn events(&self) -> Vec<OutputEvent> {
        let axes = [
            (ABS_X, self.steering),
            (ABS_Y, self.throttle),
            (ABS_RX, self.right_primary.x),
            (ABS_RY, self.right_primary.y),
            (ABS_Z, self.right_secondary.x),
            (ABS_RZ, self.right_secondary.y),
            (ABS_HAT0X, self.left.x),
            (ABS_HAT0Y, self.left.y),
        ];

        let mut events = Vec::with_capacity(axes.len() + 10);
        events.extend(axes.iter().map(|&(code, value)| OutputEvent::axis(code, value)));
        events.extend(
            self.buttons
                .codes()
                .iter()
                .map(|&(code, pressed)| OutputEvent::button(code, pressed)),
        );
        events.push(OutputEvent {
            event_type: EV_SYN,
            code: SYN_REPORT,
            value: 0,
        });
        events
    }
}

/// Builds the output frame. `right` holds the right-half contacts in slot
/// order; only the first two are passed through as raw positions.
pub fn synthesize(
    now: Duration,
    values: &DriveValues,
    contacts: &ContactSnapshot,
    right: &[TouchPoint],
    geometry: &SurfaceGeometry,
) -> OutputFrame {
    let right_pair = |finger: Option<&TouchPoint>| {
        finger
            .map(|p| AxisPair::from_normalized(geometry.right_u(p.x), geometry.v(p.y)))
            .unwrap_or_default()
    };
    let left_finger = contacts.first_left();
    let left = left_finger
        .map(|p| AxisPair::from_normalized(geometry.left_u(p.x), geometry.v(p.y)))
        .unwrap_or_default();

    let gear = values.gear;
    OutputFrame {
        time: now,
        gear,
        steering: to_axis(values.steering.value),
        throttle: to_axis(values.throttle),
        right_primary: right_pair(right.first()),
        right_secondary: right_pair(right.get(1)),
        left,
        buttons: Buttons {
            active: values.steering.active,
            gear_first: gear == Gear::First,
            gear_second: gear == Gear::Second,
            gear_third: gear == Gear::Third,
            gear_fourth: gear == Gear::Fourth,
            aux_click: values.aux_click,
            right_present: !right.is_empty(),
            left_present: left_finger.is_some(),
            right_multi: right.len() > 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::{AxisRange, Side};

    fn geometry() -> SurfaceGeometry {
        SurfaceGeometry::new(AxisRange::new(0, 1000), AxisRange::new(0, 1000))
    }

    fn contact(slot: usize, x: i32, y: i32, side: Side) -> TouchPoint {
        TouchPoint {
            slot,
            tracking_id: Some(slot as i32 + 10),
            x,
            y,
            side,
        }
    }

    #[test]
    fn axis_scaling_clamps_and_truncates() {
        assert_eq!(to_axis(0.0), 0);
        assert_eq!(to_axis(1.0), AXIS_MAX);
        assert_eq!(to_axis(-1.0), -AXIS_MAX);
        assert_eq!(to_axis(3.5), AXIS_MAX);
        assert_eq!(to_axis(-7.0), -AXIS_MAX);
        assert_eq!(to_axis(0.5), 16383);
        assert_eq!(to_axis(-0.5), -16383);
        assert_eq!(to_axis(f64::NAN), 0);
    }

    #[test]
    fn empty_surface_is_a_neutral_frame() {
        let frame = synthesize(
            Duration::ZERO,
            &DriveValues::default(),
            &ContactSnapshot::default(),
            &[],
            &geometry(),
        );
        assert_eq!(frame.steering, 0);
        assert_eq!(frame.throttle, 0);
        assert_eq!(frame.right_primary, AxisPair::default());
        assert_eq!(frame.left, AxisPair::default());
        assert_eq!(frame.buttons, Buttons::default());
        assert_eq!(frame.buttons.bits(), 0);
    }

    #[test]
    fn flags_and_raw_positions_follow_contacts() {
        let left = contact(0, 0, 500, Side::Left);
        let r1 = contact(1, 1000, 0, Side::Right);
        let r2 = contact(2, 750, 1000, Side::Right);
        let snapshot = ContactSnapshot::new(vec![r2, left, r1]);
        let values = DriveValues {
            steering: Steering {
                value: -0.25,
                active: true,
            },
            gear: Gear::Third,
            throttle: 0.5,
            aux_click: true,
        };

        let frame = synthesize(
            Duration::from_millis(40),
            &values,
            &snapshot,
            &[r1, r2],
            &geometry(),
        );

        assert_eq!(frame.time, Duration::from_millis(40));
        assert_eq!(frame.steering, -8191);
        assert_eq!(frame.throttle, 16383);
        assert_eq!(
            frame.right_primary,
            AxisPair {
                x: AXIS_MAX,
                y: -AXIS_MAX,
            }
        );
        assert_eq!(frame.right_secondary, AxisPair { x: 0, y: AXIS_MAX });
        assert_eq!(frame.left, AxisPair { x: -AXIS_MAX, y: 0 });

        let b = frame.buttons;
        assert!(b.active && b.gear_third && b.aux_click);
        assert!(!b.gear_first && !b.gear_second && !b.gear_fourth);
        assert!(b.right_present && b.left_present && b.right_multi);
    }

    #[test]
    fn right_positions_past_the_edges_are_clamped() {
        let stray = contact(0, 1200, -50, Side::Right);
        let frame = synthesize(
            Duration::ZERO,
            &DriveValues::default(),
            &ContactSnapshot::new(vec![stray]),
            &[stray],
            &geometry(),
        );
        assert_eq!(
            frame.right_primary,
            AxisPair {
                x: AXIS_MAX,
                y: -AXIS_MAX,
            }
        );
        assert!(frame.buttons.right_present);
        assert!(!frame.buttons.right_multi);
    }

    #[test]
    fn left_pair_uses_first_left_contact_even_past_centre() {
        let drifted = contact(3, 750, 250, Side::Left);
        let frame = synthesize(
            Duration::ZERO,
            &DriveValues::default(),
            &ContactSnapshot::new(vec![drifted]),
            &[],
            &geometry(),
        );
        assert!(frame.buttons.left_present);
        assert_eq!(frame.left.x, AXIS_MAX);
        assert_eq!(frame.left.y, -16383);
    }

    #[test]
    fn events_are_one_ordered_batch() {
        let frame = OutputFrame {
            steering: 5,
            throttle: -6,
            buttons: Buttons {
                gear_second: true,
                right_multi: true,
                ..Buttons::default()
            },
            ..OutputFrame::default()
        };
        let events = frame.events();

        assert_eq!(events.len(), 18);
        assert_eq!(
            events[0],
            OutputEvent {
                event_type: EV_ABS,
                code: ABS_X,
                value: 5,
            }
        );
        assert_eq!(
            events[1],
            OutputEvent {
                event_type: EV_ABS,
                code: ABS_Y,
                value: -6,
            }
        );
        assert!(events[..8].iter().all(|e| e.event_type == EV_ABS));
        assert!(events[8..17].iter().all(|e| e.event_type == EV_KEY));
        assert_eq!(
            events[10],
            OutputEvent {
                event_type: EV_KEY,
                code: BTN_EAST,
                value: 1,
            }
        );
        assert_eq!(
            events[16],
            OutputEvent {
                event_type: EV_KEY,
                code: BTN_TR,
                value: 1,
            }
        );
        assert_eq!(events[17].event_type, EV_SYN);
        assert_eq!(events[17].code, SYN_REPORT);
        assert_eq!(frame.buttons.bits(), (1 << 2) | (1 << 8));
    }
}
