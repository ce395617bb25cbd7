//! Two-finger throttle on the right half of the pad.
//!
//! While the shifter is locked, sliding both right fingers up opens the
//! throttle and sliding them down closes it (or brakes below zero). The value
//! is held: lifting a finger leaves it where it was.

use crate::config::DriveConfig;
use crate::touch::{SurfaceGeometry, TouchPoint};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrottleState {
    /// Raw throttle in `[-1, 1]`
    pub value: f64,
    /// Mean vertical position of the locked fingers on the previous frame.
    /// `None` outside locked mode so re-entry starts from a fresh baseline.
    pub last_avg: Option<f64>,
}

impl ThrottleState {
    pub fn update(
        &mut self,
        right: &[TouchPoint],
        locked: bool,
        geometry: &SurfaceGeometry,
        config: &DriveConfig,
    ) {
        if !locked || right.is_empty() {
            self.last_avg = None;
            return;
        }

        let avg_v = right.iter().map(|p| geometry.v(p.y)).sum::<f64>() / right.len() as f64;
        let last_avg = *self.last_avg.get_or_insert(avg_v);
        // screen y grows downwards, so moving up is a positive delta
        let delta = (last_avg - avg_v) * config.throttle_sensitivity;
        self.value = (self.value + delta * 2.0).clamp(-1.0, 1.0);
        self.last_avg = Some(avg_v);
    }

    /// Throttle as emitted: zero inside the neutral band, the remaining
    /// magnitude rescaled to `[0, 1]` with the sign kept.
    pub fn output(&self, config: &DriveConfig) -> f64 {
        let band = config.throttle_band();
        let magnitude = self.value.abs();
        if magnitude < band {
            return 0.0;
        }
        let scaled = ((magnitude - band) / (1.0 - band)).clamp(0.0, 1.0);
        if self.value < 0.0 {
            -scaled
        } else {
            scaled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch::{AxisRange, Side};

    fn geometry() -> SurfaceGeometry {
        SurfaceGeometry::new(AxisRange::new(0, 1000), AxisRange::new(0, 1000))
    }

    fn pair(y0: i32, y1: i32) -> [TouchPoint; 2] {
        let finger = |slot: usize, x: i32, y: i32| TouchPoint {
            slot,
            tracking_id: Some(slot as i32),
            x,
            y,
            side: Side::Right,
        };
        [finger(0, 600, y0), finger(1, 800, y1)]
    }

    #[test]
    fn first_locked_frame_only_sets_baseline() {
        let mut state = ThrottleState::default();
        state.update(&pair(500, 700), true, &geometry(), &DriveConfig::default());
        assert_eq!(state.value, 0.0);
        assert_eq!(state.last_avg, Some(0.6));
    }

    #[test]
    fn moving_up_opens_the_throttle() {
        let mut state = ThrottleState::default();
        let config = DriveConfig::default();
        state.update(&pair(800, 800), true, &geometry(), &config);
        state.update(&pair(700, 700), true, &geometry(), &config);
        assert!((state.value - 0.2).abs() < 1e-9);

        let mut previous = state.value;
        for y in (0..700).rev().step_by(50) {
            state.update(&pair(y, y), true, &geometry(), &config);
            assert!(state.value >= previous);
            assert!(state.value <= 1.0);
            previous = state.value;
        }
        assert_eq!(state.value, 1.0);
    }

    #[test]
    fn moving_down_goes_negative_and_saturates() {
        let mut state = ThrottleState::default();
        let config = DriveConfig::default();
        state.update(&pair(0, 0), true, &geometry(), &config);
        state.update(&pair(1000, 1000), true, &geometry(), &config);
        assert_eq!(state.value, -1.0);
        assert_eq!(state.output(&config), -1.0);
    }

    #[test]
    fn unlocking_keeps_value_and_drops_baseline() {
        let mut state = ThrottleState::default();
        let config = DriveConfig::default();
        state.update(&pair(600, 600), true, &geometry(), &config);
        state.update(&pair(400, 400), true, &geometry(), &config);
        let held = state.value;

        state.update(&pair(400, 400)[..1], false, &geometry(), &config);
        assert_eq!(state.value, held);
        assert_eq!(state.last_avg, None);

        // relock far away: no jump, fresh baseline
        state.update(&pair(900, 900), true, &geometry(), &config);
        assert_eq!(state.value, held);
    }

    #[test]
    fn sensitivity_scales_the_delta() {
        let mut state = ThrottleState::default();
        let config = DriveConfig {
            throttle_sensitivity: 0.5,
            ..DriveConfig::default()
        };
        state.update(&pair(500, 500), true, &geometry(), &config);
        state.update(&pair(400, 400), true, &geometry(), &config);
        assert!((state.value - 0.1).abs() < 1e-9);
    }

    #[test]
    fn output_applies_neutral_band() {
        let config = DriveConfig::default();
        let at = |value: f64| ThrottleState {
            value,
            last_avg: None,
        }
        .output(&config);

        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(0.19), 0.0);
        assert_eq!(at(-0.19), 0.0);
        assert_eq!(at(0.2), 0.0);
        assert!((at(0.6) - 0.5).abs() < 1e-9);
        assert!((at(-0.6) + 0.5).abs() < 1e-9);
        assert_eq!(at(1.0), 1.0);
    }
}
