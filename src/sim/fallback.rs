//! Physics-free placement
//!
//! When the host turns physics off, ball `i` simply lands in bucket
//! `i mod bucket_count` after a style-dependent delay.

use glam::Vec2;

use super::board::Board;
use super::event::SimEvent;
use super::state::{BallPhase, DropState};

/// Bucket for each of `ball_count` balls, in order
pub fn round_robin(ball_count: usize, bucket_count: usize) -> Vec<usize> {
    if bucket_count == 0 {
        return Vec::new();
    }
    (0..ball_count).map(|i| i % bucket_count).collect()
}

/// Place every ball on the floor of its round-robin bucket
///
/// Balls already reported are left alone, so calling this twice emits
/// nothing the second time.
pub fn settle_round_robin(state: &mut DropState, board: &Board, bucket_count: usize) -> Vec<SimEvent> {
    let bucket_width = board.width / bucket_count.max(1) as f32;
    let assignments = round_robin(state.balls.len(), bucket_count);
    let mut events = Vec::with_capacity(assignments.len());

    for (ball, bucket) in state.balls.iter_mut().zip(assignments) {
        if ball.reported {
            continue;
        }
        ball.pos = Vec2::new((bucket as f32 + 0.5) * bucket_width, board.floor_y());
        ball.vel = Vec2::ZERO;
        ball.phase = BallPhase::AtRest;
        ball.reported = true;
        events.push(SimEvent::ReachedBottom {
            ball: ball.id,
            color: ball.color,
            bucket,
        });
    }
    events
}
