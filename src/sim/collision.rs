//! Collision detection and response for balls, pins and walls
//!
//! Everything here is a pure function of positions and velocities. Randomness
//! and event emission are layered on top by the tick.

use glam::Vec2;

use super::state::Ball;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Contact point (if hit)
    pub point: Vec2,
    /// Unit normal pointing from the obstacle toward the ball center
    pub normal: Vec2,
    /// Overlap depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check a ball against a fixed circular pin
///
/// A ball centered exactly on the pin is pushed straight up.
pub fn ball_pin_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    pin_pos: Vec2,
    pin_radius: f32,
    epsilon: f32,
) -> CollisionResult {
    let delta = ball_pos - pin_pos;
    let dist = delta.length();
    let reach = ball_radius + pin_radius;

    if dist >= reach {
        return CollisionResult::miss();
    }

    let normal = if dist > epsilon {
        delta / dist
    } else {
        Vec2::NEG_Y
    };
    CollisionResult {
        hit: true,
        point: pin_pos + normal * pin_radius,
        normal,
        penetration: reach - dist,
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Reflect with energy loss: v' = v - 2(v·n)n * damping
#[inline]
pub fn reflect_velocity_damped(velocity: Vec2, normal: Vec2, damping: f32) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal * damping
}

/// Outcome of resolving one ball pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairContact {
    /// Point halfway between the two centers (after separation)
    pub midpoint: Vec2,
    /// Unit contact normal, toward the ball that was pushed (`b` for a
    /// free pair, the moving ball against a resting one)
    pub normal: Vec2,
    /// An impulse was applied (balls were approaching)
    pub impulse: bool,
}

/// Resolve overlap between two equal-mass balls
///
/// Returns `None` when the pair does not overlap or the centers coincide
/// (distance at or under `epsilon`). Overlapping balls are always separated;
/// the damped elastic impulse is applied only when they are approaching.
pub fn resolve_ball_pair(
    a: &mut Ball,
    b: &mut Ball,
    ball_radius: f32,
    damping: f32,
    epsilon: f32,
) -> Option<PairContact> {
    let delta = b.pos - a.pos;
    let dist = delta.length();
    let min_dist = 2.0 * ball_radius;

    if dist >= min_dist || dist <= epsilon {
        return None;
    }

    // Normal points from a to b
    let normal = delta / dist;
    let half_overlap = (min_dist - dist) / 2.0;
    a.pos -= normal * half_overlap;
    b.pos += normal * half_overlap;

    // Negative means closing
    let closing = (b.vel - a.vel).dot(normal);
    let impulse = closing < 0.0;
    if impulse {
        // Equal masses: each ball takes half of the (1 + e) restitution impulse
        let j = -(1.0 + damping) * closing / 2.0;
        a.vel -= normal * j;
        b.vel += normal * j;
    }

    Some(PairContact {
        midpoint: (a.pos + b.pos) / 2.0,
        normal,
        impulse,
    })
}

/// Resolve a moving ball against one that is at rest
///
/// The resting ball does not move: the moving ball takes the whole overlap.
/// Approaches faster than `bounce_speed` reflect like a pin bounce; slower
/// ones only lose their normal velocity, so a ball can sit on a pile.
pub fn resolve_against_resting(
    moving: &mut Ball,
    resting: &Ball,
    ball_radius: f32,
    damping: f32,
    bounce_speed: f32,
    epsilon: f32,
) -> Option<PairContact> {
    let delta = moving.pos - resting.pos;
    let dist = delta.length();
    let min_dist = 2.0 * ball_radius;

    if dist >= min_dist || dist <= epsilon {
        return None;
    }

    let normal = delta / dist;
    moving.pos += normal * (min_dist - dist);

    let approach = moving.vel.dot(normal);
    let impulse = approach < 0.0;
    if impulse {
        if -approach > bounce_speed {
            moving.vel = reflect_velocity_damped(moving.vel, normal, damping);
        } else {
            moving.vel -= normal * approach;
        }
    }

    Some(PairContact {
        midpoint: (moving.pos + resting.pos) / 2.0,
        normal,
        impulse,
    })
}

/// Clamp a ball between the side walls; returns true on contact
pub fn clamp_to_walls(ball: &mut Ball, min_x: f32, max_x: f32, damping: f32) -> bool {
    if ball.pos.x < min_x {
        ball.pos.x = min_x;
        ball.vel.x = ball.vel.x.abs() * damping;
        true
    } else if ball.pos.x > max_x {
        ball.pos.x = max_x;
        ball.vel.x = -ball.vel.x.abs() * damping;
        true
    } else {
        false
    }
}

/// Keep a ball below the top edge; returns true on contact
pub fn clamp_to_ceiling(ball: &mut Ball, min_y: f32, damping: f32) -> bool {
    if ball.pos.y < min_y {
        ball.pos.y = min_y;
        ball.vel.y = ball.vel.y.abs() * damping;
        true
    } else {
        false
    }
}
