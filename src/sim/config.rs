//! Simulation tuning
//!
//! Everything numeric the tick needs besides board geometry. Deserializes
//! from partial JSON; missing fields take the defaults in `crate::consts`.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use super::board::Board;
use crate::consts::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Downward acceleration (pixels/s²)
    pub gravity: f32,
    /// Fraction of normal velocity kept after a bounce (0..=1)
    pub bounce_damping: f32,
    /// Nominal time between ticks (seconds)
    pub frame_interval: f32,
    /// Upper bound on the wall-clock delta integrated by one tick
    pub max_dt: f32,
    pub bucket_count: usize,
    /// Attraction multiplier per bucket (len = bucket_count)
    pub weights: Vec<f32>,
    /// Locked buckets (len = bucket_count). Reported, never enforced here.
    pub locked: Vec<bool>,
    /// Pin bounce jitter half-ranges (pixels/s)
    pub pin_jitter_x: f32,
    pub pin_jitter_y: f32,
    pub attraction_margin: f32,
    pub attraction_strength: f32,
    pub floor_friction: f32,
    pub rest_speed: f32,
    pub collision_epsilon: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::with_buckets(BUCKET_COUNT)
    }
}

impl SimulationConfig {
    /// Default tuning with `count` equally weighted, unlocked buckets
    pub fn with_buckets(count: usize) -> Self {
        Self {
            gravity: GRAVITY,
            bounce_damping: BOUNCE_DAMPING,
            frame_interval: FRAME_INTERVAL,
            max_dt: MAX_DT,
            bucket_count: count,
            weights: vec![1.0; count],
            locked: vec![false; count],
            pin_jitter_x: PIN_JITTER_X,
            pin_jitter_y: PIN_JITTER_Y,
            attraction_margin: ATTRACTION_MARGIN,
            attraction_strength: ATTRACTION_STRENGTH,
            floor_friction: FLOOR_FRICTION,
            rest_speed: REST_SPEED,
            collision_epsilon: COLLISION_EPSILON,
        }
    }

    /// Replace the weight array (also resizes the lock flags)
    pub fn weighted(mut self, weights: Vec<f32>) -> Self {
        self.bucket_count = weights.len();
        self.locked.resize(weights.len(), false);
        self.weights = weights;
        self
    }

    /// Weight of a bucket, 1.0 when out of range
    #[inline]
    pub fn weight(&self, bucket: usize) -> f32 {
        self.weights.get(bucket).copied().unwrap_or(1.0)
    }

    pub fn is_locked(&self, bucket: usize) -> bool {
        self.locked.get(bucket).copied().unwrap_or(false)
    }

    /// Reject configurations that would produce a degenerate run
    pub fn validate(&self, board: &Board) -> Result<()> {
        ensure!(
            board.width.is_finite() && board.width > 0.0 && board.height.is_finite() && board.height > 0.0,
            "board dimensions must be positive, got {}x{}",
            board.width,
            board.height
        );
        ensure!(
            board.ball_radius.is_finite() && board.ball_radius > 0.0,
            "ball radius must be positive, got {}",
            board.ball_radius
        );
        ensure!(
            board.pin_radius.is_finite() && board.pin_radius > 0.0,
            "pin radius must be positive, got {}",
            board.pin_radius
        );
        ensure!(
            board.width > 2.0 * board.ball_radius && board.height > 2.0 * board.ball_radius,
            "board {}x{} is too small for balls of radius {}",
            board.width,
            board.height,
            board.ball_radius
        );
        ensure!(
            self.frame_interval.is_finite() && self.frame_interval > 0.0,
            "frame interval must be positive, got {}",
            self.frame_interval
        );
        ensure!(
            self.max_dt.is_finite() && self.max_dt >= self.frame_interval,
            "max dt {} must be at least the frame interval {}",
            self.max_dt,
            self.frame_interval
        );
        ensure!(
            self.max_dt <= MAX_FRAME_INTERVAL,
            "frame interval {} and max dt {} must not exceed {}s",
            self.frame_interval,
            self.max_dt,
            MAX_FRAME_INTERVAL
        );
        ensure!(self.bucket_count > 0, "bucket count must be at least 1");
        ensure!(
            self.weights.len() == self.bucket_count,
            "expected {} bucket weights, got {}",
            self.bucket_count,
            self.weights.len()
        );
        ensure!(
            self.locked.len() == self.bucket_count,
            "expected {} lock flags, got {}",
            self.bucket_count,
            self.locked.len()
        );
        ensure!(
            self.weights.iter().all(|w| w.is_finite() && *w >= 0.0),
            "bucket weights must be finite and non-negative"
        );
        ensure!(
            self.gravity.is_finite(),
            "gravity must be finite, got {}",
            self.gravity
        );
        ensure!(
            (0.0..=1.0).contains(&self.bounce_damping),
            "bounce damping must be within 0..=1, got {}",
            self.bounce_damping
        );
        ensure!(
            (0.0..1.0).contains(&self.floor_friction),
            "floor friction must be within 0..1, got {}",
            self.floor_friction
        );
        ensure!(
            self.rest_speed.is_finite() && self.rest_speed > 0.0,
            "rest speed must be positive, got {}",
            self.rest_speed
        );
        ensure!(
            self.collision_epsilon.is_finite() && self.collision_epsilon > 0.0,
            "collision epsilon must be positive, got {}",
            self.collision_epsilon
        );
        for (name, value) in [
            ("pin jitter x", self.pin_jitter_x),
            ("pin jitter y", self.pin_jitter_y),
            ("attraction margin", self.attraction_margin),
            ("attraction strength", self.attraction_strength),
        ] {
            ensure!(value.is_finite() && value >= 0.0, "{name} must be finite and non-negative, got {value}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimulationConfig::default().validate(&Board::default()).unwrap();
    }

    #[test]
    fn test_rejects_zero_buckets() {
        let config = SimulationConfig::with_buckets(0);
        let err = config.validate(&Board::default()).unwrap_err();
        assert!(err.to_string().contains("bucket count"));
    }

    #[test]
    fn test_rejects_weight_length_mismatch() {
        let mut config = SimulationConfig::with_buckets(4);
        config.weights.pop();
        assert!(config.validate(&Board::default()).is_err());
    }

    #[test]
    fn test_rejects_bad_geometry_and_interval() {
        let config = SimulationConfig::default();
        assert!(config.validate(&Board::empty(300.0, 300.0, 0.0, 3.0)).is_err());
        assert!(config.validate(&Board::empty(300.0, 300.0, 10.0, -1.0)).is_err());
        assert!(config.validate(&Board::empty(0.0, 300.0, 10.0, 3.0)).is_err());

        let mut config = SimulationConfig::default();
        config.frame_interval = 0.0;
        assert!(config.validate(&Board::default()).is_err());

        let mut config = SimulationConfig::default();
        config.bounce_damping = 1.5;
        assert!(config.validate(&Board::default()).is_err());
    }

    #[test]
    fn test_rejects_oversized_interval() {
        let config = SimulationConfig {
            frame_interval: 1e20,
            max_dt: 1e20,
            ..SimulationConfig::default()
        };
        let err = config.validate(&Board::default()).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));

        let config = SimulationConfig {
            max_dt: 5.0,
            ..SimulationConfig::default()
        };
        assert!(config.validate(&Board::default()).is_err());

        let config = SimulationConfig {
            frame_interval: MAX_FRAME_INTERVAL,
            max_dt: MAX_FRAME_INTERVAL,
            ..SimulationConfig::default()
        };
        config.validate(&Board::default()).unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"gravity": 1200.0}"#).unwrap();
        assert_eq!(config.gravity, 1200.0);
        assert_eq!(config.bucket_count, BUCKET_COUNT);
        assert_eq!(config.weights.len(), BUCKET_COUNT);
    }

    #[test]
    fn test_weighted_resizes_locks() {
        let config = SimulationConfig::default().weighted(vec![0.8, 1.0, 1.2]);
        assert_eq!(config.bucket_count, 3);
        assert_eq!(config.locked.len(), 3);
        assert_eq!(config.weight(2), 1.2);
        config.validate(&Board::default()).unwrap();
    }
}
