//! Host preferences that shape a drop
//!
//! Persisted as JSON next to the rest of the host's settings.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sim::SimulationConfig;

/// Feel of the fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GravityStyle {
    #[default]
    Smooth,
    Bouncy,
    Fast,
}

impl GravityStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            GravityStyle::Smooth => "Smooth",
            GravityStyle::Bouncy => "Bouncy",
            GravityStyle::Fast => "Fast",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "smooth" => Some(GravityStyle::Smooth),
            "bouncy" => Some(GravityStyle::Bouncy),
            "fast" => Some(GravityStyle::Fast),
            _ => None,
        }
    }

    /// Downward acceleration (pixels/s²)
    pub fn gravity(&self) -> f32 {
        match self {
            GravityStyle::Smooth => 800.0,
            GravityStyle::Bouncy => 700.0,
            GravityStyle::Fast => 1400.0,
        }
    }

    /// Bounce damping
    pub fn damping(&self) -> f32 {
        match self {
            GravityStyle::Smooth => 0.6,
            GravityStyle::Bouncy => 0.8,
            GravityStyle::Fast => 0.45,
        }
    }

    /// Delay before balls land when physics is disabled
    pub fn fallback_delay(&self) -> Duration {
        match self {
            GravityStyle::Fast => Duration::from_millis(1500),
            GravityStyle::Smooth => Duration::from_millis(2000),
            GravityStyle::Bouncy => Duration::from_millis(2500),
        }
    }
}

/// Attraction strength class of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContainerWeight {
    Weak,
    #[default]
    Normal,
    Strong,
}

impl ContainerWeight {
    pub fn multiplier(&self) -> f32 {
        match self {
            ContainerWeight::Weak => 0.8,
            ContainerWeight::Normal => 1.0,
            ContainerWeight::Strong => 1.2,
        }
    }
}

/// Drop-related preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of buckets (containers)
    pub container_count: usize,
    pub gravity_style: GravityStyle,
    /// Run the physics; otherwise balls are placed round-robin
    pub physics_enabled: bool,
    /// Per-container weight; missing entries count as normal
    pub container_weights: Vec<ContainerWeight>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_count: crate::consts::BUCKET_COUNT,
            gravity_style: GravityStyle::Smooth,
            physics_enabled: true,
            container_weights: Vec::new(),
        }
    }
}

impl Settings {
    /// Weight of every container, padded/truncated to `container_count`
    pub fn weights(&self) -> Vec<ContainerWeight> {
        let mut weights = self.container_weights.clone();
        weights.resize(self.container_count, ContainerWeight::Normal);
        weights
    }

    /// Simulation tuning for these preferences
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut config = SimulationConfig::default()
            .weighted(self.weights().iter().map(ContainerWeight::multiplier).collect());
        config.gravity = self.gravity_style.gravity();
        config.bounce_damping = self.gravity_style.damping();
        config
    }

    /// Load settings from a JSON file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let settings = serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
