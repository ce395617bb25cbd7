use std::io::Write;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::output::OutputFrame;

// Virtual device errors
#[derive(Debug, thiserror::Error)]
pub enum PadError {
    #[error("Failed to create virtual device: {0}")]
    DeviceError(String),

    #[error("Failed to write frame: {0}")]
    WriteError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Virtual device closed")]
    Closed,
}

/// Sink for complete output frames.
///
/// `emit` receives one whole frame per input frame boundary; an adapter that
/// talks to a real device writes [`OutputFrame::events`] as one batch.
pub trait VirtualPad: Send {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), PadError>;

    fn close(&mut self) {}
}

/// Writes one CSV line per frame. Used for replay runs and for diffing
/// recorded sessions.
pub struct TracePad<W: Write> {
    writer: W,
    frames_written: u64,
    closed: bool,
}

impl<W: Write> TracePad<W> {
    pub const HEADER: &'static str = "frame,ms,steer,throttle,rx,ry,z,rz,hat0x,hat0y,buttons";

    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
            closed: false,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_frame(&mut self, frame: &OutputFrame) -> std::io::Result<()> {
        if self.frames_written == 0 {
            writeln!(self.writer, "{}", Self::HEADER)?;
        }
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{},{},{:#05x}",
            self.frames_written,
            frame.time.as_millis(),
            frame.steering,
            frame.throttle,
            frame.right_primary.x,
            frame.right_primary.y,
            frame.right_secondary.x,
            frame.right_secondary.y,
            frame.left.x,
            frame.left.y,
            frame.buttons.bits(),
        )?;
        self.writer.flush()
    }
}

impl<W: Write + Send> VirtualPad for TracePad<W> {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), PadError> {
        if self.closed {
            return Err(PadError::Closed);
        }
        self.write_frame(frame)
            .map_err(|e| PadError::WriteError(e.to_string()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.writer.flush() {
            error!("Failed to flush frame trace: {}", e);
        }
        info!("Frame trace closed after {} frames", self.frames_written);
        self.closed = true;
    }
}

/// Publishes every frame on a watch channel so other tasks can follow the
/// latest controller state.
pub struct FramePublisher {
    frame_sender: watch::Sender<OutputFrame>,
}

impl FramePublisher {
    pub fn new() -> Self {
        let (frame_sender, _) = watch::channel(OutputFrame::default());
        debug!("Created watch channel for output frames");
        Self { frame_sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<OutputFrame> {
        debug!("New subscriber to output frames");
        self.frame_sender.subscribe()
    }
}

impl Default for FramePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualPad for FramePublisher {
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), PadError> {
        self.frame_sender
            .send(*frame)
            .map_err(|e| PadError::ChannelError(format!("Failed to publish frame: {}", e)))
    }
}

/// Forwards each frame to several pads in order.
pub struct FanoutPad {
    pads: Vec<Box<dyn VirtualPad>>,
}

impl FanoutPad {
    pub fn new(pads: Vec<Box<dyn VirtualPad>>) -> Self {
        Self { pads }
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }
}

impl VirtualPad for FanoutPad {
    // Stops at the first failing pad
    fn emit(&mut self, frame: &OutputFrame) -> Result<(), PadError> {
        for pad in &mut self.pads {
            pad.emit(frame)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        for pad in &mut self.pads {
            pad.close();
        }
    }
}
