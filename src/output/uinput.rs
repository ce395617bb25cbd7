//! Virtual joystick registered through `/dev/uinput`.
//!
//! The device exposes exactly the axes and buttons that
//! [`OutputFrame::events`] writes, so every frame updates the whole
//! controller in one report.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
};
use tracing::{debug, info};

use crate::output::pad::{PadError, VirtualPad};
use crate::output::{OutputFrame, AXIS_MAX};
use crate::touch::codes::{EV_ABS, EV_KEY, EV_SYN};

pub const DEVICE_NAME: &str = "touchpad-virtual-joystick";

const VENDOR_ID: u16 = 0x1234;
const PRODUCT_ID: u16 = 0x5678;
const AXIS_MIN: i32 = -AXIS_MAX - 1;

pub struct UinputPad {
    device: VirtualDevice,
    frames_written: u64,
}

impl UinputPad {
    pub fn create() -> Result<Self, PadError> {
        let (axes, buttons) = capabilities();
        let device_error = |e: std::io::Error| PadError::DeviceError(e.to_string());

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(device_error)?
            .name(DEVICE_NAME)
            .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, 1));
        for code in &axes {
            let setup = UinputAbsSetup::new(
                AbsoluteAxisType(*code),
                AbsInfo::new(0, AXIS_MIN, AXIS_MAX, 0, 0, 0),
            );
            builder = builder.with_absolute_axis(&setup).map_err(device_error)?;
        }
        let mut keys = AttributeSet::<Key>::new();
        for code in &buttons {
            keys.insert(Key::new(*code));
        }
        let device = builder
            .with_keys(&keys)
            .map_err(device_error)?
            .build()
            .map_err(device_error)?;

        info!(
            "Created virtual joystick '{}' with {} axes and {} buttons",
            DEVICE_NAME,
            axes.len(),
            buttons.len()
        );
        Ok(Self {
            device,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl VirtualPad for UinputPad {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), PadError> {
        self.device
            .emit(&batch(frame))
            .map_err(|e| PadError::WriteError(e.to_string()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) {
        debug!("Virtual joystick closing after {} frames", self.frames_written);
    }
}

/// Axis and button codes, in the order a frame writes them.
pub fn capabilities() -> (Vec<u16>, Vec<u16>) {
    let events = OutputFrame::default().events();
    let of_type = |event_type: u16| {
        events
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.code)
            .collect::<Vec<_>>()
    };
    (of_type(EV_ABS), of_type(EV_KEY))
}

/// The frame as kernel events without the trailing sync marker; the device
/// appends its own `SYN_REPORT` to every batch it emits.
pub fn batch(frame: &OutputFrame) -> Vec<InputEvent> {
    frame
        .events()
        .iter()
        .filter(|e| e.event_type != EV_SYN)
        .map(|e| InputEvent::new(EventType(e.event_type), e.code, e.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::Gear;
    use crate::output::Buttons;
    use crate::touch::codes::{
        ABS_HAT0X, ABS_HAT0Y, ABS_RX, ABS_RY, ABS_RZ, ABS_X, ABS_Y, ABS_Z, BTN_JOYSTICK, BTN_TR,
    };

    #[test]
    fn capabilities_cover_every_frame_event() {
        let (axes, buttons) = capabilities();
        assert_eq!(
            axes,
            vec![ABS_X, ABS_Y, ABS_RX, ABS_RY, ABS_Z, ABS_RZ, ABS_HAT0X, ABS_HAT0Y]
        );
        assert_eq!(buttons.len(), 9);
        assert_eq!(buttons[0], BTN_JOYSTICK);
        assert_eq!(buttons[8], BTN_TR);
    }

    #[test]
    fn batch_drops_the_sync_marker() {
        let frame = OutputFrame {
            gear: Gear::Third,
            steering: -AXIS_MAX,
            throttle: 1200,
            buttons: Buttons {
                active: true,
                gear_third: true,
                ..Buttons::default()
            },
            ..OutputFrame::default()
        };
        let events = batch(&frame);

        assert_eq!(events.len(), 17);
        assert!(events.iter().all(|e| e.event_type() != EventType::SYNCHRONIZATION));
        assert_eq!(events[0].event_type(), EventType::ABSOLUTE);
        assert_eq!((events[0].code(), events[0].value()), (ABS_X, -AXIS_MAX));
        assert_eq!((events[1].code(), events[1].value()), (ABS_Y, 1200));
        let pressed: Vec<u16> = events
            .iter()
            .filter(|e| e.event_type() == EventType::KEY && e.value() == 1)
            .map(|e| e.code())
            .collect();
        assert_eq!(pressed.len(), 2);
        assert_eq!(pressed[0], BTN_JOYSTICK);
    }
}
