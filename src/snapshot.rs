//! Left-finger snapshot for external viewers.
//!
//! The file always holds one JSON object:
//!
//! ```text
//! {"left":{"active":true,"x":0.25,"y":0.5}}
//! ```
//!
//! `x` and `y` are normalized to the left half and clamped to `[0, 1]`; both
//! are 0 while no left finger is down. Writing is best effort and rate
//! limited to one write per [`SNAPSHOT_INTERVAL_MS`] of frame time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rate_limiter::RateLimiter;
use crate::touch::{ContactSnapshot, SurfaceGeometry};

pub const SNAPSHOT_INTERVAL_MS: u64 = 20;

// Snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    SerializeError(String),

    #[error("Failed to write snapshot to {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LeftSnapshot {
    pub active: bool,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TouchSnapshot {
    pub left: LeftSnapshot,
}

impl TouchSnapshot {
    pub fn capture(contacts: &ContactSnapshot, geometry: &SurfaceGeometry) -> Self {
        let left = contacts
            .first_left()
            .map(|p| LeftSnapshot {
                active: true,
                x: geometry.left_u(p.x).clamp(0.0, 1.0),
                y: geometry.v(p.y).clamp(0.0, 1.0),
            })
            .unwrap_or_default();
        Self { left }
    }
}

pub struct SnapshotWriter {
    path: PathBuf,
    limiter: RateLimiter,
}

impl SnapshotWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            limiter: RateLimiter::from_millis(SNAPSHOT_INTERVAL_MS),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot if the interval has elapsed. Returns whether a
    /// write happened.
    pub fn maybe_write(
        &mut self,
        now: Duration,
        contacts: &ContactSnapshot,
        geometry: &SurfaceGeometry,
    ) -> Result<bool, SnapshotError> {
        if !self.limiter.should_process(now) {
            return Ok(false);
        }
        self.write(&TouchSnapshot::capture(contacts, geometry))?;
        Ok(true)
    }

    pub fn write(&self, snapshot: &TouchSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| SnapshotError::SerializeError(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| SnapshotError::WriteError {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Snapshot written to {:?}", self.path);
        Ok(())
    }
}
