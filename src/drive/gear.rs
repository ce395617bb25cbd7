//! H-pattern shifter on the right half of the pad.
//!
//! A single right finger selects a gear by quadrant. Either normalized
//! coordinate inside the neutral band means neutral:
//!
//! ```text
//!            u < band    u > band
//! v < band      1           4
//! v > band      2           3
//! ```
//!
//! A new position only engages after it has been held continuously for
//! `gear_hold_time` (`neutral_reset_hold` for neutral). Two or more right
//! fingers lock the gear at its current value while they drive the throttle.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::config::DriveConfig;
use crate::touch::{SurfaceGeometry, TouchPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gear {
    #[default]
    Neutral,
    First,
    Second,
    Third,
    Fourth,
}

impl Gear {
    pub fn from_number(number: u8) -> Option<Gear> {
        match number {
            0 => Some(Gear::Neutral),
            1 => Some(Gear::First),
            2 => Some(Gear::Second),
            3 => Some(Gear::Third),
            4 => Some(Gear::Fourth),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Gear::Neutral => 0,
            Gear::First => 1,
            Gear::Second => 2,
            Gear::Third => 3,
            Gear::Fourth => 4,
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Neutral => write!(f, "N"),
            gear => write!(f, "{}", gear.number()),
        }
    }
}

/// Shifter state threaded between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GearState {
    /// Last committed gear
    pub last_gear: Gear,
    /// Candidate currently being held
    pub pending_gear: Gear,
    pub pending_since: Duration,
    pub lock_active: bool,
    pub locked_gear: Gear,
    /// Time of the last frame spent in locked mode
    pub last_locked_at: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GearReading {
    pub gear: Gear,
    pub locked: bool,
}

impl GearState {
    /// Advances the shifter by one frame. `right` holds the right-half
    /// contacts in slot order.
    pub fn update(
        &mut self,
        right: &[TouchPoint],
        geometry: &SurfaceGeometry,
        config: &DriveConfig,
        now: Duration,
    ) -> GearReading {
        let candidate = if right.len() >= 2 {
            if !self.lock_active {
                debug!("Two-finger lock engaged at gear {}", self.last_gear);
                self.locked_gear = self.last_gear;
                self.lock_active = true;
            }
            self.last_locked_at = Some(now);
            self.locked_gear
        } else {
            if self.lock_active {
                debug!("Two-finger lock released");
            }
            self.lock_active = false;
            if self.in_release_grace(config, now) {
                self.last_gear
            } else {
                shift_candidate(right.first(), geometry, config)
            }
        };

        self.debounce(candidate, config, now);

        GearReading {
            gear: if self.lock_active {
                self.locked_gear
            } else {
                self.last_gear
            },
            locked: self.lock_active,
        }
    }

    fn in_release_grace(&self, config: &DriveConfig, now: Duration) -> bool {
        self.last_locked_at
            .is_some_and(|at| now < at.saturating_add(config.release_grace()))
    }

    fn debounce(&mut self, candidate: Gear, config: &DriveConfig, now: Duration) {
        if candidate == self.last_gear {
            self.pending_gear = candidate;
            self.pending_since = now;
            return;
        }

        if self.pending_gear != candidate {
            debug!("Gear {} pending", candidate);
            self.pending_gear = candidate;
            self.pending_since = now;
        } else if now < self.pending_since {
            // clock stepped back: restart the hold from here
            debug!("Sample time went backwards, restarting hold for gear {}", candidate);
            self.pending_since = now;
        }

        let required = if candidate == Gear::Neutral {
            config.neutral_hold()
        } else {
            config.gear_hold()
        };
        if now.saturating_sub(self.pending_since) >= required {
            debug!("Gear {} committed (was {})", candidate, self.last_gear);
            self.last_gear = candidate;
        }
    }
}

/// Gear selected by the position of a single right finger, or neutral when
/// there is none.
pub fn shift_candidate(
    finger: Option<&TouchPoint>,
    geometry: &SurfaceGeometry,
    config: &DriveConfig,
) -> Gear {
    let Some(finger) = finger else {
        return Gear::Neutral;
    };
    let u = geometry.right_u(finger.x);
    let v = geometry.v(finger.y);
    let (low, high) = (config.neutral_min, config.neutral_max);

    let in_band = |value: f64| value >= low && value <= high;
    if in_band(u) || in_band(v) {
        return Gear::Neutral;
    }

    let side = |value: f64| {
        if value < low {
            Some(0u8)
        } else if value > high {
            Some(1u8)
        } else {
            None
        }
    };
    let (Some(column), Some(mut row)) = (side(u), side(v)) else {
        return Gear::Neutral;
    };
    // right column runs bottom to top
    if column == 1 {
        row = 1 - row;
    }
    Gear::from_number(column * 2 + row + 1).unwrap_or_default()
}
