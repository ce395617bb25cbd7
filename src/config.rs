//! Tuning parameters for the estimators and their live-reloading source.
//!
//! Files are TOML unless the extension is `.json`. Keys may be written in
//! `snake_case` or `camelCase`. Unknown keys are ignored and missing keys take
//! their defaults; anything else wrong with a file rejects it as a whole.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::rate_limiter::RateLimiter;

const CONFIG_DIR: &str = "touchjoy";
const CONFIG_FILE: &str = "config.toml";

/// How often the config file is re-read, in frame time.
pub const CONFIG_RELOAD_INTERVAL_MS: u64 = 250;

/// Upper bound applied to `throttle_neutral_band`.
pub const MAX_THROTTLE_NEUTRAL_BAND: f64 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config value: {0}")]
    ValidationError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    /// Angular delta (radians per frame) that maps to full steering lock
    #[serde(alias = "steerDeltaScale")]
    pub steer_delta_scale: f64,

    /// Radius around the steering centre, in device units, that disengages
    /// steering
    #[serde(alias = "steerDeadzone")]
    pub steer_deadzone: f64,

    #[serde(alias = "neutralMin")]
    pub neutral_min: f64,

    #[serde(alias = "neutralMax")]
    pub neutral_max: f64,

    /// Seconds a gear position must be held before it engages
    #[serde(alias = "gearHoldTime")]
    pub gear_hold_time: f64,

    /// Seconds the neutral band must be held before the gear drops out
    #[serde(alias = "neutralResetHold")]
    pub neutral_reset_hold: f64,

    #[serde(alias = "throttleNeutralBand")]
    pub throttle_neutral_band: f64,

    #[serde(alias = "throttleSensitivity")]
    pub throttle_sensitivity: f64,

    /// Seconds after leaving two-finger throttle during which the shifter
    /// ignores the remaining finger
    #[serde(alias = "throttleReleaseGrace")]
    pub throttle_release_grace: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            steer_delta_scale: 0.1,
            steer_deadzone: 10.0,
            neutral_min: 0.45,
            neutral_max: 0.55,
            gear_hold_time: 0.12,
            neutral_reset_hold: 0.15,
            throttle_neutral_band: 0.2,
            throttle_sensitivity: 1.0,
            throttle_release_grace: 0.2,
        }
    }
}

impl DriveConfig {
    pub fn gear_hold(&self) -> Duration {
        seconds(self.gear_hold_time)
    }

    pub fn neutral_hold(&self) -> Duration {
        seconds(self.neutral_reset_hold)
    }

    pub fn release_grace(&self) -> Duration {
        seconds(self.throttle_release_grace)
    }

    /// Throttle neutral band as applied, clamped to `[0, 0.6]`.
    pub fn throttle_band(&self) -> f64 {
        self.throttle_neutral_band
            .clamp(0.0, MAX_THROTTLE_NEUTRAL_BAND)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("steer_delta_scale", self.steer_delta_scale),
            ("steer_deadzone", self.steer_deadzone),
            ("neutral_min", self.neutral_min),
            ("neutral_max", self.neutral_max),
            ("gear_hold_time", self.gear_hold_time),
            ("neutral_reset_hold", self.neutral_reset_hold),
            ("throttle_neutral_band", self.throttle_neutral_band),
            ("throttle_sensitivity", self.throttle_sensitivity),
            ("throttle_release_grace", self.throttle_release_grace),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be finite, got {}",
                name, value
            )));
        }
        if self.steer_delta_scale <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "steer_delta_scale must be positive, got {}",
                self.steer_delta_scale
            )));
        }
        Ok(())
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        if is_json(path) {
            Self::from_json(&text)
        } else {
            Self::from_toml(&text)
        }
    }

    /// Writes the defaults to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(format!("{}: {}", parent.display(), e)))?;
        }
        let defaults = Self::default();
        let content = if is_json(path) {
            serde_json::to_string_pretty(&defaults)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?
        } else {
            toml::to_string_pretty(&defaults).map_err(|e| ConfigError::WriteError(e.to_string()))?
        };
        fs::write(path, content)
            .map_err(|e| ConfigError::WriteError(format!("{}: {}", path.display(), e)))?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }
}

/// `<config dir>/touchjoy/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Holds the live config and re-reads its file on a cadence.
///
/// A failed reload leaves the current config untouched.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: Option<PathBuf>,
    current: DriveConfig,
    limiter: RateLimiter,
}

impl ConfigWatcher {
    pub fn new(path: Option<PathBuf>, initial: DriveConfig) -> Self {
        Self {
            path,
            current: initial,
            limiter: RateLimiter::from_millis(CONFIG_RELOAD_INTERVAL_MS),
        }
    }

    /// Loads `path` once up front, falling back to defaults.
    pub fn open(path: Option<PathBuf>) -> Self {
        let initial = match &path {
            Some(p) => match DriveConfig::load(p) {
                Ok(config) => {
                    info!("Loaded drive config from {}", p.display());
                    config
                }
                Err(e) => {
                    warn!("Using default drive config: {}", e);
                    DriveConfig::default()
                }
            },
            None => {
                info!("No config file given, using defaults");
                DriveConfig::default()
            }
        };
        debug!("Initial drive config: {:?}", initial);
        Self::new(path, initial)
    }

    pub fn config(&self) -> &DriveConfig {
        &self.current
    }

    /// Re-reads the file if the reload interval has passed. Returns whether
    /// the active config changed.
    pub fn poll(&mut self, now: Duration) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !self.limiter.should_process(now) {
            return Ok(false);
        }
        let loaded = DriveConfig::load(path)?;
        if loaded == self.current {
            return Ok(false);
        }
        info!("Drive config reloaded from {}", path.display());
        debug!("New drive config: {:?}", loaded);
        self.current = loaded;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let c = DriveConfig::default();
        assert_eq!(c.steer_delta_scale, 0.1);
        assert_eq!(c.steer_deadzone, 10.0);
        assert_eq!(c.neutral_min, 0.45);
        assert_eq!(c.neutral_max, 0.55);
        assert_eq!(c.gear_hold_time, 0.12);
        assert_eq!(c.neutral_reset_hold, 0.15);
        assert_eq!(c.throttle_neutral_band, 0.2);
        assert_eq!(c.throttle_sensitivity, 1.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_overrides_known_keys_and_ignores_others() {
        let c = DriveConfig::from_toml(
            "steer_deadzone = 25\n\
             gearHoldTime = 0.3\n\
             shift_margin = 0.12\n",
        )
        .unwrap();
        assert_eq!(c.steer_deadzone, 25.0);
        assert_eq!(c.gear_hold_time, 0.3);
        assert_eq!(c.neutral_min, 0.45);
    }

    #[test]
    fn json_accepts_both_key_styles() {
        let c = DriveConfig::from_json(
            r#"{"steer_delta_scale": 0.2, "throttleSensitivity": 2, "unused": "x"}"#,
        )
        .unwrap();
        assert_eq!(c.steer_delta_scale, 0.2);
        assert_eq!(c.throttle_sensitivity, 2.0);
    }

    #[test]
    fn wrong_value_type_rejects_the_whole_source() {
        assert!(matches!(
            DriveConfig::from_json(r#"{"steer_deadzone": "wide", "neutral_min": 0.3}"#),
            Err(ConfigError::ParseError(_))
        ));
        assert!(DriveConfig::from_toml("steer_deadzone = [").is_err());
        assert!(matches!(
            DriveConfig::from_toml("steer_delta_scale = 0"),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(DriveConfig::from_toml("gear_hold_time = nan").is_err());
    }

    #[test]
    fn throttle_band_is_clamped() {
        let c = DriveConfig {
            throttle_neutral_band: 0.9,
            ..DriveConfig::default()
        };
        assert_eq!(c.throttle_band(), MAX_THROTTLE_NEUTRAL_BAND);
        let c = DriveConfig {
            throttle_neutral_band: -1.0,
            ..DriveConfig::default()
        };
        assert_eq!(c.throttle_band(), 0.0);
    }

    #[test]
    fn negative_hold_is_zero() {
        let c = DriveConfig {
            gear_hold_time: -1.0,
            ..DriveConfig::default()
        };
        assert_eq!(c.gear_hold(), Duration::ZERO);
        let default_hold = DriveConfig::default().gear_hold().as_secs_f64();
        assert!((default_hold - 0.12).abs() < 1e-6);
    }

    #[test]
    fn watcher_keeps_previous_config_on_bad_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.toml");
        fs::write(&path, "steer_deadzone = 30\n").unwrap();

        let mut watcher = ConfigWatcher::open(Some(path.clone()));
        assert_eq!(watcher.config().steer_deadzone, 30.0);

        fs::write(&path, "steer_deadzone = = 40\n").unwrap();
        assert!(watcher.poll(Duration::from_millis(0)).is_err());
        assert_eq!(watcher.config().steer_deadzone, 30.0);

        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "steer_deadzone = 40").unwrap();
        drop(file);

        // still inside the reload interval
        assert!(!watcher.poll(Duration::from_millis(100)).unwrap());
        assert_eq!(watcher.config().steer_deadzone, 30.0);

        assert!(watcher.poll(Duration::from_millis(300)).unwrap());
        assert_eq!(watcher.config().steer_deadzone, 40.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = ConfigWatcher::open(Some(dir.path().join("absent.toml")));
        assert_eq!(watcher.config(), &DriveConfig::default());
    }

    #[test]
    fn writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("nested").join("config.toml");
        let json_path = dir.path().join("config.json");

        DriveConfig::write_default(&toml_path).unwrap();
        DriveConfig::write_default(&json_path).unwrap();

        assert_eq!(DriveConfig::load(&toml_path).unwrap(), DriveConfig::default());
        assert_eq!(DriveConfig::load(&json_path).unwrap(), DriveConfig::default());
    }
}
