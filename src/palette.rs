//! Buckets and palette building
//!
//! The simulator only says where a ball landed. Whether the bucket takes the
//! ball (locked buckets refuse) and how a bucket turns into one palette
//! color is decided here.

use serde::{Deserialize, Serialize};

use crate::color::{Rgb, mix_all};
use crate::settings::ContainerWeight;
use crate::sim::{Settled, SimulationConfig};

/// How a bucket's collected colors reduce to a single palette entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaletteMode {
    /// First ball to land wins
    #[default]
    First,
    /// Average of every ball in the bucket
    Mix,
}

/// One bucket (container) at the bottom of the board
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub colors: Vec<Rgb>,
    pub locked: bool,
    pub weight: ContainerWeight,
}

impl Bucket {
    pub fn new(weight: ContainerWeight) -> Self {
        Self {
            colors: Vec::new(),
            locked: false,
            weight,
        }
    }

    pub fn reduce(&self, mode: PaletteMode) -> Option<Rgb> {
        match mode {
            PaletteMode::First => self.colors.first().copied(),
            PaletteMode::Mix => mix_all(&self.colors),
        }
    }
}

/// All buckets of one board
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketSet {
    pub buckets: Vec<Bucket>,
}

impl BucketSet {
    /// `count` empty, unlocked, normally weighted buckets
    pub fn new(count: usize) -> Self {
        Self {
            buckets: vec![Bucket::default(); count],
        }
    }

    pub fn from_weights(weights: &[ContainerWeight]) -> Self {
        Self {
            buckets: weights.iter().map(|&w| Bucket::new(w)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Flip a bucket's lock; returns the new state (`None` if out of range)
    pub fn toggle_lock(&mut self, index: usize) -> Option<bool> {
        let bucket = self.buckets.get_mut(index)?;
        bucket.locked = !bucket.locked;
        Some(bucket.locked)
    }

    /// Take a settled ball if its bucket exists and is unlocked
    pub fn accept(&mut self, settled: &Settled) -> bool {
        match self.buckets.get_mut(settled.bucket) {
            Some(bucket) if !bucket.locked => {
                bucket.colors.push(settled.color);
                true
            }
            Some(_) => {
                log::debug!("bucket {} is locked, dropping ball {}", settled.bucket, settled.ball);
                false
            }
            None => {
                log::warn!("ball {} reported unknown bucket {}", settled.ball, settled.bucket);
                false
            }
        }
    }

    /// Empty every unlocked bucket (locked buckets keep their colors)
    pub fn clear_unlocked(&mut self) {
        for bucket in self.buckets.iter_mut().filter(|b| !b.locked) {
            bucket.colors.clear();
        }
    }

    /// One color per non-empty bucket, left to right
    pub fn palette(&self, mode: PaletteMode) -> Vec<Rgb> {
        self.buckets.iter().filter_map(|b| b.reduce(mode)).collect()
    }

    /// Simulation config whose weights and locks mirror these buckets
    pub fn apply_to(&self, config: SimulationConfig) -> SimulationConfig {
        let mut config = config.weighted(self.buckets.iter().map(|b| b.weight.multiplier()).collect());
        config.locked = self.buckets.iter().map(|b| b.locked).collect();
        config
    }
}
