//! Live multitouch input from a kernel event device.
//!
//! The device is opened by path; picking the right `/dev/input/event*` node
//! is left to the caller. Reads block until the kernel has a complete report,
//! and every event of that report is queued so [`TouchSource::next_sample`]
//! still hands out one sample at a time.

use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, SystemTime};

use evdev::{AbsoluteAxisType, Device, InputEvent};
use tracing::{info, warn};

use crate::touch::codes::{ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT};
use crate::touch::sample::TouchSample;
use crate::touch::source::{SourceError, TouchSource};
use crate::touch::surface::{AxisRange, SurfaceInfo};

const REQUIRED_AXES: [u16; 3] = [ABS_MT_SLOT, ABS_MT_POSITION_X, ABS_MT_POSITION_Y];

pub struct EvdevSource {
    device: Device,
    surface: SurfaceInfo,
    pending: VecDeque<TouchSample>,
    // Wall time of the first event read, sample times are relative to it
    epoch: Option<SystemTime>,
}

impl EvdevSource {
    /// Opens a multitouch device and reads its axis ranges and slot count.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        info!("Opening touch device {}", path.display());
        let device = Device::open(path)
            .map_err(|e| SourceError::OpenError(format!("{}: {}", path.display(), e)))?;

        let supported = device.supported_absolute_axes();
        let has_axis =
            |code: u16| supported.is_some_and(|axes| axes.contains(AbsoluteAxisType(code)));
        let missing: Vec<u16> = REQUIRED_AXES
            .iter()
            .copied()
            .filter(|code| !has_axis(*code))
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::OpenError(format!(
                "{} is not a multitouch touchpad (missing axes {:#04x?})",
                path.display(),
                missing
            )));
        }

        let abs = device
            .get_abs_state()
            .map_err(|e| SourceError::OpenError(format!("Failed to read axis info: {}", e)))?;
        let x = &abs[usize::from(ABS_MT_POSITION_X)];
        let y = &abs[usize::from(ABS_MT_POSITION_Y)];
        let slot = &abs[usize::from(ABS_MT_SLOT)];
        let surface = surface_from_ranges(
            AxisRange::new(x.minimum, x.maximum),
            AxisRange::new(y.minimum, y.maximum),
            slot.maximum,
        );

        info!(
            "Touch device '{}': x {}..{}, y {}..{}, {} slots",
            device.name().unwrap_or("unnamed"),
            surface.x.min,
            surface.x.max,
            surface.y.min,
            surface.y.max,
            surface.slots
        );
        Ok(Self {
            device,
            surface,
            pending: VecDeque::new(),
            epoch: None,
        })
    }

    fn fill(&mut self) -> Result<(), SourceError> {
        let events: Vec<InputEvent> = self
            .device
            .fetch_events()
            .map_err(|e| SourceError::ReadError(e.to_string()))?
            .collect();

        let first = events.first().map_or_else(SystemTime::now, InputEvent::timestamp);
        let epoch = *self.epoch.get_or_insert(first);
        self.pending
            .extend(events.iter().map(|event| to_sample(event, epoch)));
        Ok(())
    }
}

impl TouchSource for EvdevSource {
    fn surface(&self) -> SurfaceInfo {
        self.surface
    }

    fn grab(&mut self) -> Result<(), SourceError> {
        self.device
            .grab()
            .map_err(|e| SourceError::GrabError(e.to_string()))
    }

    fn release(&mut self) {
        if let Err(e) = self.device.ungrab() {
            warn!("Failed to release touch device: {}", e);
        }
    }

    // The device never ends on its own; a vanished device is a read error
    fn next_sample(&mut self) -> Result<Option<TouchSample>, SourceError> {
        while self.pending.is_empty() {
            self.fill()?;
        }
        Ok(self.pending.pop_front())
    }
}

/// Surface description from the kernel's axis info. `slot_max` is the highest
/// slot index, so a pad without an `ABS_MT_SLOT` range reports zero slots.
pub fn surface_from_ranges(x: AxisRange, y: AxisRange, slot_max: i32) -> SurfaceInfo {
    let slots = usize::try_from(slot_max.saturating_add(1)).unwrap_or(0);
    SurfaceInfo::new(x, y, slots)
}

/// Converts a kernel event, timestamped relative to `epoch`. Events stamped
/// before `epoch` land at zero.
pub fn to_sample(event: &InputEvent, epoch: SystemTime) -> TouchSample {
    let time = event
        .timestamp()
        .duration_since(epoch)
        .unwrap_or(Duration::ZERO);
    TouchSample::from_raw(time, event.event_type().0, event.code(), event.value())
}
