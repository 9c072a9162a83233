//! Ball state for a single drop
//!
//! The tick owns a `DropState`; the outside world only ever sees `Snapshot`s.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::board::Board;
use crate::color::Rgb;

/// Where a ball is in its fall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallPhase {
    /// Airborne (may be bouncing off pins or other balls)
    Falling,
    /// On the floor or held up by resting balls, sliding to a stop
    Grounded,
    /// Stopped; never moves again but still blocks other balls
    AtRest,
}

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    /// Stable for the lifetime of one drop
    pub id: u32,
    pub color: Rgb,
    pub pos: Vec2,
    pub vel: Vec2,
    pub phase: BallPhase,
    /// Settlement already emitted (at most once per run)
    pub reported: bool,
}

impl Ball {
    pub fn new(id: u32, color: Rgb, pos: Vec2) -> Self {
        Self {
            id,
            color,
            pos,
            vel: Vec2::ZERO,
            phase: BallPhase::Falling,
            reported: false,
        }
    }

    pub fn with_velocity(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    #[inline]
    pub fn at_rest(&self) -> bool {
        self.phase == BallPhase::AtRest
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }
}

/// All balls of one run (fixed count for the whole run)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DropState {
    /// Sorted by id
    pub balls: Vec<Ball>,
    /// Ticks advanced so far
    pub time_ticks: u64,
}

impl DropState {
    pub fn new(mut balls: Vec<Ball>) -> Self {
        balls.sort_by_key(|b| b.id);
        Self { balls, time_ticks: 0 }
    }

    /// One ball per color at the board's spawn positions, ids 1..=n
    pub fn spawn(board: &Board, colors: &[Rgb]) -> Self {
        let balls = board
            .spawn_positions(colors.len())
            .into_iter()
            .zip(colors)
            .enumerate()
            .map(|(i, (pos, &color))| Ball::new(i as u32 + 1, color, pos))
            .collect();
        Self::new(balls)
    }

    /// Every ball has stopped (trivially true with no balls)
    pub fn all_at_rest(&self) -> bool {
        self.balls.iter().all(Ball::at_rest)
    }

    pub fn snapshot(&self, running: bool) -> Snapshot {
        Snapshot {
            tick: self.time_ticks,
            running,
            balls: self
                .balls
                .iter()
                .map(|b| BallSnapshot {
                    id: b.id,
                    color: b.color,
                    pos: b.pos,
                    phase: b.phase,
                })
                .collect(),
        }
    }
}

/// Render-facing copy of one ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub id: u32,
    pub color: Rgb,
    pub pos: Vec2,
    pub phase: BallPhase,
}

/// Published after every tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    /// A run is still scheduling ticks
    pub running: bool,
    pub balls: Vec<BallSnapshot>,
}
