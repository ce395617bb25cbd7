use std::time::Duration;

use crate::touch::codes::{
    ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, BTN_LEFT, BTN_MIDDLE,
    BTN_RIGHT, EV_ABS, EV_KEY, EV_SYN, SYN_REPORT,
};

// Event type of a raw sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    AbsoluteMotion,
    Key,
    FrameSync,
    Other(u16),
}

impl SampleKind {
    pub fn from_raw(event_type: u16) -> Self {
        match event_type {
            EV_ABS => SampleKind::AbsoluteMotion,
            EV_KEY => SampleKind::Key,
            EV_SYN => SampleKind::FrameSync,
            other => SampleKind::Other(other),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            SampleKind::AbsoluteMotion => EV_ABS,
            SampleKind::Key => EV_KEY,
            SampleKind::FrameSync => EV_SYN,
            SampleKind::Other(other) => other,
        }
    }
}

/// One raw input primitive as delivered by the touch source.
///
/// `time` is monotonic and only meaningful relative to other samples of the
/// same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub time: Duration,
    pub kind: SampleKind,
    pub code: u16,
    pub value: i32,
}

// What a sample means to the slot tracker and the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEvent {
    SlotSelect(i32),
    TrackingId(i32),
    PositionX(i32),
    PositionY(i32),
    Click { pressed: bool },
    FrameBoundary,
    Ignored,
}

impl TouchSample {
    pub fn new(time: Duration, kind: SampleKind, code: u16, value: i32) -> Self {
        Self {
            time,
            kind,
            code,
            value,
        }
    }

    pub fn from_raw(time: Duration, event_type: u16, code: u16, value: i32) -> Self {
        Self::new(time, SampleKind::from_raw(event_type), code, value)
    }

    pub fn slot(time: Duration, slot: i32) -> Self {
        Self::new(time, SampleKind::AbsoluteMotion, ABS_MT_SLOT, slot)
    }

    pub fn tracking_id(time: Duration, id: i32) -> Self {
        Self::new(time, SampleKind::AbsoluteMotion, ABS_MT_TRACKING_ID, id)
    }

    pub fn position_x(time: Duration, x: i32) -> Self {
        Self::new(time, SampleKind::AbsoluteMotion, ABS_MT_POSITION_X, x)
    }

    pub fn position_y(time: Duration, y: i32) -> Self {
        Self::new(time, SampleKind::AbsoluteMotion, ABS_MT_POSITION_Y, y)
    }

    pub fn click(time: Duration, pressed: bool) -> Self {
        Self::new(time, SampleKind::Key, BTN_LEFT, i32::from(pressed))
    }

    pub fn frame_sync(time: Duration) -> Self {
        Self::new(time, SampleKind::FrameSync, SYN_REPORT, 0)
    }

    /// Classifies the sample. Codes the bridge does not consume map to
    /// [`SampleEvent::Ignored`].
    pub fn decode(&self) -> SampleEvent {
        match self.kind {
            SampleKind::AbsoluteMotion => match self.code {
                ABS_MT_SLOT => SampleEvent::SlotSelect(self.value),
                ABS_MT_TRACKING_ID => SampleEvent::TrackingId(self.value),
                ABS_MT_POSITION_X => SampleEvent::PositionX(self.value),
                ABS_MT_POSITION_Y => SampleEvent::PositionY(self.value),
                _ => SampleEvent::Ignored,
            },
            SampleKind::Key => match self.code {
                BTN_LEFT | BTN_RIGHT | BTN_MIDDLE => SampleEvent::Click {
                    pressed: self.value == 1,
                },
                _ => SampleEvent::Ignored,
            },
            SampleKind::FrameSync if self.code == SYN_REPORT => SampleEvent::FrameBoundary,
            _ => SampleEvent::Ignored,
        }
    }
}
