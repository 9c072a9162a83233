//! One simulation step
//!
//! Advances every in-flight ball by a wall-clock `dt`: integration, pin and
//! ball contacts, walls, bucket attraction, floor friction and settlement.
//! Pure apart from the injected RNG, so a seeded RNG reproduces a run.

use glam::Vec2;
use rand::Rng;

use super::board::Board;
use super::collision::{
    ball_pin_collision, clamp_to_ceiling, clamp_to_walls, reflect_velocity_damped, resolve_against_resting,
    resolve_ball_pair,
};
use super::config::SimulationConfig;
use super::event::SimEvent;
use super::state::{BallPhase, DropState};
use crate::consts::PILE_SUPPORT_NORMAL_Y;

/// Bucket under a horizontal position, clamped to `[0, bucket_count)`
pub fn bucket_index(x: f32, board_width: f32, bucket_count: usize) -> usize {
    let bucket_width = board_width / bucket_count as f32;
    // `as usize` saturates: negative and NaN both land in bucket 0
    let raw = (x / bucket_width).floor() as usize;
    raw.min(bucket_count.saturating_sub(1))
}

#[inline]
fn jitter<R: Rng + ?Sized>(rng: &mut R, half_range: f32) -> f32 {
    if half_range > 0.0 {
        rng.random_range(-half_range..=half_range)
    } else {
        0.0
    }
}

/// Advance the drop by one tick
///
/// Events produced this tick are appended to `events`. Returns true once
/// every ball is at rest (immediately for an empty drop).
pub fn tick<R: Rng + ?Sized>(
    state: &mut DropState,
    board: &Board,
    config: &SimulationConfig,
    rng: &mut R,
    dt: f32,
    events: &mut Vec<SimEvent>,
) -> bool {
    let dt = if dt.is_finite() { dt.clamp(0.0, config.max_dt) } else { 0.0 };
    let r = board.ball_radius;
    let damping = config.bounce_damping;
    let eps = config.collision_epsilon;
    let start: Vec<Vec2> = state.balls.iter().map(|b| b.pos).collect();

    // Integration
    for ball in state.balls.iter_mut().filter(|b| !b.at_rest()) {
        ball.vel.y += config.gravity * dt;
        ball.pos += ball.vel * dt;
    }

    // Pin contacts
    for ball in state.balls.iter_mut().filter(|b| !b.at_rest()) {
        for pin in board.pins() {
            let hit = ball_pin_collision(ball.pos, r, pin.pos, board.pin_radius, eps);
            if !hit.hit {
                continue;
            }
            ball.pos += hit.normal * hit.penetration;
            if ball.vel.dot(hit.normal) < 0.0 {
                ball.vel = reflect_velocity_damped(ball.vel, hit.normal, damping);
            }
            ball.vel += Vec2::new(jitter(rng, config.pin_jitter_x), jitter(rng, config.pin_jitter_y));
        }
    }

    // Ball-ball contacts, both members updated before the next pair.
    // Resting balls are fixed obstacles that can hold other balls up.
    let bounce_speed = 2.0 * config.gravity * dt;
    let n = state.balls.len();
    let mut supported = vec![false; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let (head, tail) = state.balls.split_at_mut(j);
            let (a, b) = (&mut head[i], &mut tail[0]);
            let contact = match (a.at_rest(), b.at_rest()) {
                (true, true) => None,
                (false, false) => resolve_ball_pair(a, b, r, damping, eps),
                (true, false) => {
                    let contact = resolve_against_resting(b, a, r, damping, bounce_speed, eps);
                    supported[j] |= contact.is_some_and(|c| c.normal.y <= -PILE_SUPPORT_NORMAL_Y);
                    contact
                }
                (false, true) => {
                    let contact = resolve_against_resting(a, b, r, damping, bounce_speed, eps);
                    supported[i] |= contact.is_some_and(|c| c.normal.y <= -PILE_SUPPORT_NORMAL_Y);
                    contact
                }
            };
            match contact {
                Some(contact) if contact.impulse => events.push(SimEvent::Collision {
                    a: a.id,
                    b: b.id,
                    color_a: a.color,
                    color_b: b.color,
                    midpoint: contact.midpoint,
                }),
                _ => {}
            }
        }
    }

    // Walls and ceiling
    let (min_x, max_x) = board.x_bounds();
    for ball in state.balls.iter_mut().filter(|b| !b.at_rest()) {
        clamp_to_walls(ball, min_x, max_x, damping);
        clamp_to_ceiling(ball, r, damping);
    }

    // Bucket attraction (airborne balls near the bottom only)
    let bucket_count = config.bucket_count.max(1);
    let bucket_width = board.width / bucket_count as f32;
    let range = bucket_width * crate::consts::ATTRACTION_RANGE_BUCKETS;
    for ball in state.balls.iter_mut().filter(|b| b.phase == BallPhase::Falling) {
        if board.height - ball.pos.y > config.attraction_margin {
            continue;
        }
        for bucket in 0..bucket_count {
            let center = (bucket as f32 + 0.5) * bucket_width;
            let offset = center - ball.pos.x;
            let distance = offset.abs();
            if distance > range || distance <= eps {
                continue;
            }
            let falloff = (1.0 - distance / range).clamp(0.0, 1.0);
            let pull = config.weight(bucket) * config.attraction_strength * falloff * falloff;
            ball.vel.x += offset.signum() * pull * rng.random_range(0.8f32..=1.2) * dt;
        }
    }

    // Floor and pile: clamp, friction, rest detection
    let floor_y = board.floor_y();
    for (k, ball) in state.balls.iter_mut().enumerate() {
        if ball.at_rest() {
            continue;
        }
        if ball.pos.y >= floor_y {
            ball.pos.y = floor_y;
            ball.vel.y = 0.0;
            ball.vel.x *= config.floor_friction;
            if ball.vel.x.abs() < config.rest_speed {
                ball.vel.x = 0.0;
                ball.phase = BallPhase::AtRest;
            } else {
                ball.phase = BallPhase::Grounded;
            }
        } else if supported[k] {
            // Wedged balls can keep a velocity they cannot act on
            ball.vel.y = 0.0;
            ball.vel.x *= config.floor_friction;
            let moved = ball.pos.distance(start[k]);
            if ball.vel.x.abs() < config.rest_speed || moved < config.rest_speed * dt {
                ball.vel = Vec2::ZERO;
                ball.phase = BallPhase::AtRest;
            } else {
                ball.phase = BallPhase::Grounded;
            }
        } else {
            ball.phase = BallPhase::Falling;
        }
    }

    // Settlement, at most once per ball
    for ball in state.balls.iter_mut().filter(|b| b.at_rest() && !b.reported) {
        ball.reported = true;
        let bucket = bucket_index(ball.pos.x, board.width, bucket_count);
        log::debug!("ball {} settled at x={:.1} -> bucket {}", ball.id, ball.pos.x, bucket);
        events.push(SimEvent::ReachedBottom {
            ball: ball.id,
            color: ball.color,
            bucket,
        });
    }

    state.time_ticks += 1;
    debug_assert!(
        state.balls.iter().all(|b| b.is_finite()),
        "non-finite ball state after tick {}",
        state.time_ticks
    );

    state.all_at_rest()
}

/// Run fixed-`dt` ticks until everything rests or `max_ticks` pass
///
/// Headless counterpart of the threaded runner. Returns the number of ticks
/// taken, or `None` if the drop had not settled in time.
pub fn run_until_settled<R: Rng + ?Sized>(
    state: &mut DropState,
    board: &Board,
    config: &SimulationConfig,
    rng: &mut R,
    dt: f32,
    max_ticks: u64,
    events: &mut Vec<SimEvent>,
) -> Option<u64> {
    for n in 1..=max_ticks {
        if tick(state, board, config, rng, dt, events) {
            return Some(n);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{FALLBACK_COLORS, Rgb};
    use crate::consts::*;
    use crate::sim::board::Board;
    use crate::sim::state::Ball;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    const DT: f32 = 1.0 / 60.0;

    fn open_board() -> Board {
        Board::empty(300.0, 300.0, BALL_RADIUS, PIN_RADIUS)
    }

    fn settled(events: &[SimEvent]) -> Vec<(u32, usize)> {
        events
            .iter()
            .filter_map(|e| match *e {
                SimEvent::ReachedBottom { ball, bucket, .. } => Some((ball, bucket)),
                _ => None,
            })
            .collect()
    }

    fn collisions(events: &[SimEvent]) -> usize {
        events.iter().filter(|e| matches!(e, SimEvent::Collision { .. })).count()
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(150.0, 300.0, 6), 3);
        assert_eq!(bucket_index(0.0, 300.0, 6), 0);
        assert_eq!(bucket_index(299.9, 300.0, 6), 5);
        assert_eq!(bucket_index(300.0, 300.0, 6), 5);
        assert_eq!(bucket_index(-5.0, 300.0, 6), 0);
        assert_eq!(bucket_index(f32::NAN, 300.0, 6), 0);
        assert_eq!(bucket_index(42.0, 300.0, 1), 0);
    }

    #[test]
    fn test_single_ball_falls_and_settles() {
        let board = open_board();
        let config = SimulationConfig::with_buckets(3);
        let mut state = DropState::new(vec![Ball::new(1, Rgb::new(255, 0, 0), Vec2::new(150.0, 20.0))]);
        let mut rng = Pcg32::seed_from_u64(7);
        let mut events = Vec::new();

        let ticks = run_until_settled(&mut state, &board, &config, &mut rng, DT, 600, &mut events);
        assert!(ticks.is_some(), "ball never came to rest");

        let ball = &state.balls[0];
        assert_eq!(ball.pos.y, board.floor_y());
        assert_eq!(ball.vel, Vec2::ZERO);
        assert_eq!(settled(&events), vec![(1, (150.0f32 / (300.0 / 3.0)).floor() as usize)]);
        assert_eq!(collisions(&events), 0);

        // Further ticks never report the ball again
        for _ in 0..10 {
            assert!(tick(&mut state, &board, &config, &mut rng, DT, &mut events));
        }
        assert_eq!(settled(&events).len(), 1);
    }

    #[test]
    fn test_approaching_pair_collides_once() {
        let board = open_board();
        let config = SimulationConfig::default();
        let mut state = DropState::new(vec![
            Ball::new(1, Rgb::new(255, 0, 0), Vec2::new(100.0, 100.0)).with_velocity(Vec2::new(60.0, 0.0)),
            Ball::new(2, Rgb::new(0, 0, 255), Vec2::new(115.0, 100.0)).with_velocity(Vec2::new(-60.0, 0.0)),
        ]);
        let mut rng = Pcg32::seed_from_u64(1);
        let mut events = Vec::new();

        tick(&mut state, &board, &config, &mut rng, DT, &mut events);
        assert_eq!(collisions(&events), 1);
        let dist = state.balls[0].pos.distance(state.balls[1].pos);
        assert!(dist >= 2.0 * BALL_RADIUS - config.collision_epsilon, "distance {dist}");

        // Now separating: no further impulse, no further event
        assert!(state.balls[0].vel.x < state.balls[1].vel.x);
        events.clear();
        tick(&mut state, &board, &config, &mut rng, DT, &mut events);
        assert_eq!(collisions(&events), 0);

        let spark = SimEvent::Collision {
            a: 1,
            b: 2,
            color_a: Rgb::new(255, 0, 0),
            color_b: Rgb::new(0, 0, 255),
            midpoint: Vec2::ZERO,
        }
        .spark_color();
        assert_eq!(spark, Some(crate::color::mix(Rgb::new(255, 0, 0), Rgb::new(0, 0, 255))));
    }

    #[test]
    fn test_coincident_balls_stay_finite() {
        let board = open_board();
        let config = SimulationConfig::default();
        let pos = Vec2::new(150.0, 50.0);
        let mut state = DropState::new(vec![
            Ball::new(1, Rgb::new(1, 1, 1), pos),
            Ball::new(2, Rgb::new(2, 2, 2), pos),
        ]);
        let mut rng = Pcg32::seed_from_u64(3);
        let mut events = Vec::new();
        tick(&mut state, &board, &config, &mut rng, DT, &mut events);
        assert!(state.balls.iter().all(|b| b.is_finite()));
        assert_eq!(collisions(&events), 0);
    }

    fn resting_ball(id: u32, x: f32, board: &Board) -> Ball {
        let mut ball = Ball::new(id, Rgb::new(255, 0, 0), Vec2::new(x, board.floor_y()));
        ball.phase = BallPhase::AtRest;
        ball.reported = true;
        ball
    }

    /// Tick until settled, returning the closest approach between `ball`
    /// and any resting ball
    fn drop_onto_pile(state: &mut DropState, board: &Board, seed: u64, events: &mut Vec<SimEvent>) -> f32 {
        let config = SimulationConfig::with_buckets(3);
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut closest = f32::MAX;
        let mut done = false;
        for _ in 0..5_000 {
            done = tick(state, board, &config, &mut rng, DT, events);
            let moving = state.balls.last().map(|b| b.pos).unwrap_or_default();
            for other in &state.balls[..state.balls.len() - 1] {
                closest = closest.min(other.pos.distance(moving));
            }
            if done {
                break;
            }
        }
        assert!(done, "pile never settled");
        closest
    }

    #[test]
    fn test_falling_ball_bounces_off_resting_ball() {
        let board = open_board();
        let mut state = DropState::new(vec![
            resting_ball(1, 150.0, &board),
            Ball::new(2, Rgb::new(0, 0, 255), Vec2::new(151.0, 200.0)),
        ]);
        let mut events = Vec::new();
        let closest = drop_onto_pile(&mut state, &board, 1, &mut events);

        assert!(closest >= 2.0 * BALL_RADIUS - 1e-3, "balls interpenetrated: {closest}");
        assert_eq!(state.balls[0].pos, Vec2::new(150.0, board.floor_y()));
        assert!(collisions(&events) >= 1);
        let reports = settled(&events);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, 2);
    }

    #[test]
    fn test_ball_wedged_between_resting_balls_settles_on_top() {
        let board = open_board();
        let mut state = DropState::new(vec![
            resting_ball(1, 140.0, &board),
            resting_ball(2, 172.0, &board),
            Ball::new(3, Rgb::new(0, 0, 255), Vec2::new(156.0, 200.0)),
        ]);
        let mut events = Vec::new();
        let closest = drop_onto_pile(&mut state, &board, 4, &mut events);

        assert!(closest >= 2.0 * BALL_RADIUS - 1e-3, "balls interpenetrated: {closest}");
        let top = &state.balls[2];
        assert!(top.at_rest());
        assert!(top.pos.y < board.floor_y() - 1.0, "ball fell through the pile: {:?}", top.pos);
        assert!(top.pos.x > 140.0 && top.pos.x < 172.0);
        assert_eq!(settled(&events), vec![(3, 1)]);
    }

    #[test]
    fn test_zero_balls_finish_on_first_tick() {
        let mut state = DropState::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let mut events = Vec::new();
        let ticks = run_until_settled(
            &mut state,
            &Board::default(),
            &SimulationConfig::default(),
            &mut rng,
            DT,
            100,
            &mut events,
        );
        assert_eq!(ticks, Some(1));
        assert!(events.is_empty());
    }

    #[test]
    fn test_huge_dt_is_capped() {
        let board = open_board();
        let config = SimulationConfig::default();
        let mut state = DropState::new(vec![Ball::new(1, Rgb::new(0, 0, 0), Vec2::new(150.0, 20.0))]);
        let mut rng = Pcg32::seed_from_u64(0);
        let mut events = Vec::new();
        tick(&mut state, &board, &config, &mut rng, 10.0, &mut events);
        assert!((state.balls[0].vel.y - config.gravity * config.max_dt).abs() < 0.01);
        tick(&mut state, &board, &config, &mut rng, f32::INFINITY, &mut events);
        assert!(state.balls[0].is_finite());
    }

    #[test]
    fn test_pin_bounce_deflects() {
        // Ball dropped straight onto a pin gets pushed out and kicked sideways
        let board = open_board().with_pins(vec![crate::sim::board::Pin { pos: Vec2::new(150.0, 100.0) }]);
        let config = SimulationConfig::default();
        let mut state = DropState::new(vec![Ball::new(1, Rgb::new(0, 0, 0), Vec2::new(150.5, 60.0))]);
        let mut rng = Pcg32::seed_from_u64(11);
        let mut events = Vec::new();
        let mut touched = false;
        for _ in 0..120 {
            tick(&mut state, &board, &config, &mut rng, DT, &mut events);
            let d = state.balls[0].pos.distance(Vec2::new(150.0, 100.0));
            assert!(d >= BALL_RADIUS + PIN_RADIUS - 0.001, "ball left inside the pin: {d}");
            if state.balls[0].pos.y > 100.0 {
                touched = true;
                break;
            }
        }
        assert!(touched, "ball never got past the pin");
        assert!((state.balls[0].pos.x - 150.0).abs() > 1.0);
    }

    #[test]
    fn test_same_seed_reproduces_run() {
        let board = Board::default();
        let config = SimulationConfig::default();
        let run = |seed: u64| {
            let mut state = DropState::spawn(&board, &FALLBACK_COLORS[..6]);
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut events = Vec::new();
            run_until_settled(&mut state, &board, &config, &mut rng, DT, 5_000, &mut events);
            settled(&events)
        };
        assert_eq!(run(42), run(42));
    }

    fn single_drop_bucket(board: &Board, config: &SimulationConfig, seed: u64) -> usize {
        let mut rng = Pcg32::seed_from_u64(seed);
        let (min_x, max_x) = board.x_bounds();
        let x = rng.random_range(min_x..=max_x);
        let mut state = DropState::new(vec![Ball::new(1, Rgb::new(0, 0, 0), Vec2::new(x, SPAWN_Y))]);
        let mut events = Vec::new();
        run_until_settled(&mut state, board, config, &mut rng, DT, 5_000, &mut events)
            .expect("single drop must settle");
        settled(&events)[0].1
    }

    #[test]
    fn test_equal_weights_spread_evenly() {
        let board = Board::default();
        let config = SimulationConfig::with_buckets(3);
        let runs = 600;
        let mut counts = [0usize; 3];
        for seed in 0..runs {
            counts[single_drop_bucket(&board, &config, seed)] += 1;
        }
        let expected = runs as usize / 3;
        for (bucket, &count) in counts.iter().enumerate() {
            assert!(
                count.abs_diff(expected) <= expected * 3 / 10,
                "bucket {bucket} got {count} of {runs} ({counts:?})"
            );
        }
    }

    #[test]
    fn test_heavy_bucket_attracts_more() {
        let board = open_board();
        let equal = SimulationConfig::with_buckets(3);
        let heavy = SimulationConfig::with_buckets(3).weighted(vec![0.2, 3.0, 0.2]);
        let (mut even_hits, mut heavy_hits) = (0, 0);
        for seed in 0..300 {
            even_hits += usize::from(single_drop_bucket(&board, &equal, seed) == 1);
            heavy_hits += usize::from(single_drop_bucket(&board, &heavy, seed) == 1);
        }
        assert!(heavy_hits > even_hits, "heavy {heavy_hits} vs even {even_hits}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn every_ball_reports_once_inside_the_board(seed in any::<u64>(), count in 0usize..8, buckets in 1usize..9) {
            let board = Board::default();
            let config = SimulationConfig::with_buckets(buckets);
            let colors: Vec<Rgb> = (0..count).map(|i| FALLBACK_COLORS[i % FALLBACK_COLORS.len()]).collect();
            let mut state = DropState::spawn(&board, &colors);
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut events = Vec::new();

            let mut done = false;
            for _ in 0..20_000 {
                done = tick(&mut state, &board, &config, &mut rng, DT, &mut events);
                for ball in &state.balls {
                    prop_assert!(ball.is_finite());
                    prop_assert!(ball.pos.x >= board.ball_radius - 1e-3);
                    prop_assert!(ball.pos.x <= board.width - board.ball_radius + 1e-3);
                    prop_assert!(ball.pos.y >= 0.0 && ball.pos.y <= board.height);
                }
                if done {
                    break;
                }
            }
            prop_assert!(done, "drop did not settle");

            let mut reports = settled(&events);
            prop_assert_eq!(reports.len(), count);
            prop_assert!(reports.iter().all(|&(_, bucket)| bucket < buckets));
            reports.sort_unstable();
            reports.dedup_by_key(|r| r.0);
            prop_assert_eq!(reports.len(), count);
        }
    }
}
