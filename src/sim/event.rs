//! Events reported by a run
//!
//! Produced inside the tick, delivered to the host from the dispatcher.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::{self, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A ball came to rest over a bucket. The bucket is advisory: the
    /// consumer decides whether to accept it (e.g. locked buckets).
    ReachedBottom { ball: u32, color: Rgb, bucket: usize },
    /// Two balls touched while approaching each other this tick
    Collision {
        a: u32,
        b: u32,
        color_a: Rgb,
        color_b: Rgb,
        midpoint: Vec2,
    },
}

impl SimEvent {
    /// Color of the spark shown for a collision
    pub fn spark_color(&self) -> Option<Rgb> {
        match *self {
            SimEvent::Collision { color_a, color_b, .. } => Some(color::mix(color_a, color_b)),
            SimEvent::ReachedBottom { .. } => None,
        }
    }
}

/// Settlement payload handed to `on_reached_bottom`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settled {
    pub ball: u32,
    pub color: Rgb,
    pub bucket: usize,
}

/// Collision payload handed to `on_collision`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub a: u32,
    pub b: u32,
    pub color_a: Rgb,
    pub color_b: Rgb,
    pub midpoint: Vec2,
}

impl Contact {
    pub fn spark_color(&self) -> Rgb {
        color::mix(self.color_a, self.color_b)
    }
}
