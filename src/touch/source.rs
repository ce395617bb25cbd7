//! Where raw samples come from.
//!
//! The bridge only sees the [`TouchSource`] trait. Live input comes from
//! [`EvdevSource`](crate::touch::EvdevSource), which reads and grabs a kernel
//! input device. [`ReplaySource`] plays back a recorded trace so the whole
//! pipeline runs without hardware.
//!
//! # Trace format
//!
//! ```text
//! # comment
//! surface,<min_x>,<max_x>,<min_y>,<max_y>[,<slots>]
//! ev,<ms>,<type>,<code>,<value>
//! ```
//!
//! `type` and `code` accept decimal or `0x` hex. The `surface` record must come
//! before the first `ev` record.
//!
//! `ms` must be monotonic (non-decreasing). Debounce and every rate limit run
//! on these timestamps. A step backwards restarts a pending gear hold and
//! every rate-limit interval from the new time.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::touch::sample::TouchSample;
use crate::touch::surface::{AxisRange, SurfaceInfo, DEFAULT_SLOT_CAPACITY};

// Touch source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open touch source: {0}")]
    OpenError(String),

    #[error("Failed to read touch sample: {0}")]
    ReadError(String),

    #[error("Invalid trace line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Failed to grab touch device: {0}")]
    GrabError(String),
}

/// A stream of raw multitouch samples plus the exclusive grab on the device
/// that produces them.
pub trait TouchSource: Send {
    /// Axis ranges and slot capacity, fixed for the life of the source.
    fn surface(&self) -> SurfaceInfo;

    /// Takes exclusive ownership of the device so the desktop stops reacting
    /// to it.
    fn grab(&mut self) -> Result<(), SourceError>;

    /// Gives the device back. Must be safe to call when not grabbed.
    fn release(&mut self);

    /// Blocks until the next sample. `Ok(None)` means the stream ended.
    fn next_sample(&mut self) -> Result<Option<TouchSample>, SourceError>;
}

/// Plays back a recorded sample trace, parsing one line per sample.
pub struct ReplaySource<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    surface: SurfaceInfo,
    grabbed: bool,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        info!("Opening replay trace {}", path.display());
        let file = File::open(path)
            .map_err(|e| SourceError::OpenError(format!("{}: {}", path.display(), e)))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> ReplaySource<R> {
    /// Reads up to and including the `surface` record.
    pub fn new(reader: R) -> Result<Self, SourceError> {
        let mut lines = reader.lines();
        let mut line_no = 0;

        let surface = loop {
            let Some(line) = next_record(&mut lines, &mut line_no)? else {
                return Err(SourceError::OpenError(
                    "trace has no surface record".to_string(),
                ));
            };
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match fields[0] {
                "surface" => break parse_surface(&fields, line_no)?,
                "ev" => {
                    return Err(SourceError::ParseError {
                        line: line_no,
                        reason: "sample before surface record".to_string(),
                    })
                }
                other => debug!("Skipping unknown trace record '{}' on line {}", other, line_no),
            }
        };

        info!(
            "Replay surface: x {}..{}, y {}..{}, {} slots",
            surface.x.min, surface.x.max, surface.y.min, surface.y.max, surface.slots
        );
        Ok(Self {
            lines,
            line_no,
            surface,
            grabbed: false,
        })
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed
    }
}

impl<R: BufRead + Send> TouchSource for ReplaySource<R> {
    fn surface(&self) -> SurfaceInfo {
        self.surface
    }

    fn grab(&mut self) -> Result<(), SourceError> {
        self.grabbed = true;
        Ok(())
    }

    fn release(&mut self) {
        self.grabbed = false;
    }

    fn next_sample(&mut self) -> Result<Option<TouchSample>, SourceError> {
        loop {
            let Some(line) = next_record(&mut self.lines, &mut self.line_no)? else {
                return Ok(None);
            };
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            match fields[0] {
                "ev" => return parse_sample(&fields, self.line_no).map(Some),
                other => debug!(
                    "Skipping trace record '{}' on line {}",
                    other, self.line_no
                ),
            }
        }
    }
}

// Next non-empty, non-comment line
fn next_record<R: BufRead>(
    lines: &mut Lines<R>,
    line_no: &mut usize,
) -> Result<Option<String>, SourceError> {
    for line in lines.by_ref() {
        *line_no += 1;
        let line = line.map_err(|e| SourceError::ReadError(format!("line {}: {}", line_no, e)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return Ok(Some(trimmed.to_string()));
    }
    Ok(None)
}

fn parse_surface(fields: &[&str], line: usize) -> Result<SurfaceInfo, SourceError> {
    if fields.len() != 5 && fields.len() != 6 {
        return Err(SourceError::ParseError {
            line,
            reason: format!("surface record needs 4 or 5 values, got {}", fields.len() - 1),
        });
    }
    let x = AxisRange::new(
        parse_int(fields[1], line, "min_x")?,
        parse_int(fields[2], line, "max_x")?,
    );
    let y = AxisRange::new(
        parse_int(fields[3], line, "min_y")?,
        parse_int(fields[4], line, "max_y")?,
    );
    let slots = match fields.get(5) {
        Some(raw) => usize::try_from(parse_int(raw, line, "slots")?).map_err(|_| {
            SourceError::ParseError {
                line,
                reason: "slots must not be negative".to_string(),
            }
        })?,
        None => DEFAULT_SLOT_CAPACITY,
    };
    Ok(SurfaceInfo::new(x, y, slots))
}

fn parse_sample(fields: &[&str], line: usize) -> Result<TouchSample, SourceError> {
    if fields.len() != 5 {
        return Err(SourceError::ParseError {
            line,
            reason: format!("sample record needs 4 values, got {}", fields.len() - 1),
        });
    }
    let ms = fields[1]
        .parse::<u64>()
        .map_err(|e| SourceError::ParseError {
            line,
            reason: format!("ms: {}", e),
        })?;
    let event_type = to_u16(parse_int(fields[2], line, "type")?, line, "type")?;
    let code = to_u16(parse_int(fields[3], line, "code")?, line, "code")?;
    let value = parse_int(fields[4], line, "value")?;
    Ok(TouchSample::from_raw(
        Duration::from_millis(ms),
        event_type,
        code,
        value,
    ))
}

fn parse_int(raw: &str, line: usize, field: &str) -> Result<i32, SourceError> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => raw.parse::<i32>(),
    };
    parsed.map_err(|e| SourceError::ParseError {
        line,
        reason: format!("{}: {}", field, e),
    })
}

fn to_u16(value: i32, line: usize, field: &str) -> Result<u16, SourceError> {
    u16::try_from(value).map_err(|_| SourceError::ParseError {
        line,
        reason: format!("{} {} out of range", field, value),
    })
}
