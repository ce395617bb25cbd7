//! Touch-to-joystick bridge loop
//!
//! The bridge owns the touch source, the virtual pad and all state threaded
//! between frames. Its lifecycle is a statum typestate:
//!
//! ```text
//! Bridge<Initializing> ──initialize──► Bridge<Running> ──run──► BridgeSummary
//!                       (grab device)                  (until end/cancel)
//! ```
//!
//! Samples are applied strictly one at a time. Estimators run and a frame is
//! emitted only at a frame boundary, so the pad never sees a half-updated set
//! of contacts. Config reloads and snapshot writes piggyback on frame
//! boundaries and never stop the loop.

use std::time::Duration;

use chrono::Local;
use statum::{machine, state};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigWatcher;
use crate::drive::{self, DriveState, Gear};
use crate::output::{PadError, VirtualPad};
use crate::rate_limiter::RateLimiter;
use crate::snapshot::SnapshotWriter;
use crate::touch::surface::DEFAULT_SLOT_CAPACITY;
use crate::touch::{
    SampleEvent, SlotTracker, SourceError, SurfaceGeometry, TouchSample, TouchSource,
};

/// Interval of the debug slot readout, in frame time
pub const SLOT_READOUT_INTERVAL_MS: u64 = 100;

const STATS_INTERVAL_SECS: i64 = 10;

// Bridge errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Touch source error: {0}")]
    SourceError(#[from] SourceError),

    #[error("Virtual pad error: {0}")]
    PadError(#[from] PadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The source reported the end of its stream
    #[default]
    EndOfStream,
    /// Shutdown was requested from outside
    Cancelled,
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeSummary {
    pub samples: u64,
    pub frames: u64,
    pub gear_changes: u64,
    pub final_gear: Gear,
    pub stop_reason: StopReason,
}

#[state]
#[derive(Debug, Clone)]
pub enum BridgeState {
    Initializing,
    Running,
}

#[machine]
pub struct Bridge<S: BridgeState> {
    source: Box<dyn TouchSource>,
    pad: Box<dyn VirtualPad>,
    geometry: SurfaceGeometry,

    // Authoritative contact table, updated per sample
    tracker: SlotTracker,

    // Estimator state, updated per frame
    drive: DriveState,

    config: ConfigWatcher,
    snapshot: Option<SnapshotWriter>,

    // Last known state of the physical click buttons
    aux_click: bool,

    grabbed: bool,
    readout_limiter: RateLimiter,
    summary: BridgeSummary,
}

impl<S: BridgeState> Bridge<S> {
    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }
}

impl Bridge<Initializing> {
    pub fn create(
        source: Box<dyn TouchSource>,
        pad: Box<dyn VirtualPad>,
        config: ConfigWatcher,
        snapshot: Option<SnapshotWriter>,
    ) -> Self {
        let surface = source.surface();
        let geometry = SurfaceGeometry::from_surface(&surface);
        info!(
            "Creating bridge for surface x {}..{}, y {}..{}",
            surface.x.min, surface.x.max, surface.y.min, surface.y.max
        );
        debug!("Surface geometry: {:?}", geometry);

        let capacity = if surface.slots == 0 {
            warn!(
                "Source reports no slots, falling back to {}",
                DEFAULT_SLOT_CAPACITY
            );
            DEFAULT_SLOT_CAPACITY
        } else {
            surface.slots
        };

        if let Some(writer) = &snapshot {
            info!("Writing left-finger snapshot to {}", writer.path().display());
        }

        Self::new(
            source,
            pad,
            geometry,
            SlotTracker::new(geometry, capacity),
            DriveState::default(),
            config,
            snapshot,
            false, // aux_click
            false, // grabbed
            RateLimiter::from_millis(SLOT_READOUT_INTERVAL_MS),
            BridgeSummary::default(),
        )
    }

    /// Grabs the device and transitions to Running. A failed grab is not
    /// fatal: the bridge still runs, the desktop just keeps seeing the pad.
    pub fn initialize(mut self) -> Bridge<Running> {
        match self.source.grab() {
            Ok(()) => {
                info!("Touch device grabbed");
                self.grabbed = true;
            }
            Err(e) => warn!("Continuing without exclusive grab: {}", e),
        }

        info!("Bridge initialized, transitioning to Running state");
        self.transition()
    }
}

impl Bridge<Running> {
    /// Runs until the source ends, `cancel` fires, or a source or pad error
    /// occurs. The device grab is released on every exit.
    pub fn run(mut self, cancel: &CancellationToken) -> Result<BridgeSummary, BridgeError> {
        info!("Starting bridge loop");
        let result = self.run_loop(cancel);
        self.shutdown();

        match result {
            Ok(()) => {
                info!(
                    "Bridge stopped ({:?}): {} samples, {} frames, {} gear changes",
                    self.summary.stop_reason,
                    self.summary.samples,
                    self.summary.frames,
                    self.summary.gear_changes
                );
                Ok(self.summary)
            }
            Err(e) => {
                error!("Bridge loop terminated with error: {}", e);
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), BridgeError> {
        // For performance monitoring
        let mut samples_since_log = 0u64;
        let mut frames_at_log = 0u64;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(STATS_INTERVAL_SECS);

        loop {
            if cancel.is_cancelled() {
                info!("Shutdown requested");
                self.summary.stop_reason = StopReason::Cancelled;
                return Ok(());
            }

            let Some(sample) = self.source.next_sample()? else {
                info!("Touch source reached end of stream");
                self.summary.stop_reason = StopReason::EndOfStream;
                return Ok(());
            };
            self.summary.samples += 1;
            samples_since_log += 1;
            self.handle_sample(sample)?;

            // Log stats periodically
            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Bridge stats: {} samples, {} frames in last {} seconds (avg {:.2} frames/sec)",
                    samples_since_log,
                    self.summary.frames - frames_at_log,
                    log_interval.num_seconds(),
                    (self.summary.frames - frames_at_log) as f64 / log_interval.num_seconds() as f64
                );
                samples_since_log = 0;
                frames_at_log = self.summary.frames;
                last_log_time = now;
            }
        }
    }

    fn handle_sample(&mut self, sample: TouchSample) -> Result<(), BridgeError> {
        match sample.decode() {
            SampleEvent::Click { pressed } => {
                if pressed != self.aux_click {
                    debug!("Aux click {}", if pressed { "pressed" } else { "released" });
                }
                self.aux_click = pressed;
            }
            SampleEvent::FrameBoundary => self.process_frame(sample.time)?,
            event => self.tracker.apply(event),
        }
        Ok(())
    }

    fn process_frame(&mut self, now: Duration) -> Result<(), BridgeError> {
        // best effort, the previous config stays active on failure
        if let Err(e) = self.config.poll(now) {
            debug!("Config reload skipped: {}", e);
        }

        let contacts = self.tracker.snapshot();
        let frame = drive::process_frame(
            &mut self.drive,
            &contacts,
            &self.geometry,
            self.config.config(),
            now,
            self.aux_click,
        );
        self.pad.emit(&frame)?;

        self.summary.frames += 1;
        if frame.gear != self.summary.final_gear {
            self.summary.gear_changes += 1;
            self.summary.final_gear = frame.gear;
        }

        if let Some(writer) = &mut self.snapshot {
            if let Err(e) = writer.maybe_write(now, &contacts, &self.geometry) {
                debug!("Snapshot write skipped: {}", e);
            }
        }

        if self.readout_limiter.should_process(now) {
            self.log_slots();
        }
        Ok(())
    }

    fn log_slots(&self) {
        let slots: Vec<String> = self
            .tracker
            .tracked()
            .map(|c| match (c.x, c.y) {
                (Some(x), Some(y)) => format!("{}:({},{}) {:?}", c.slot, x, y, c.side),
                _ => format!("{}:(-) {:?}", c.slot, c.side),
            })
            .collect();
        debug!(
            "Slots [{}] gear {} throttle {:.2}",
            slots.join(" "),
            self.summary.final_gear,
            self.drive.throttle.value
        );
    }

    fn shutdown(&mut self) {
        if self.grabbed {
            self.source.release();
            self.grabbed = false;
            info!("Touch device released");
        }
        self.pad.close();
    }
}
