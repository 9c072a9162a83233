//! Pin-field simulation module
//!
//! The physics is split in two layers:
//! - `tick`: a pure step function over `DropState` (seeded RNG in, events out)
//! - `runner`: the threaded `Simulator` that paces ticks off the wall clock
//!   and hands events to the host on a separate dispatcher thread
//!
//! No rendering or platform dependencies live here.

pub mod board;
pub mod collision;
pub mod config;
pub mod event;
pub mod fallback;
pub mod runner;
pub mod state;
pub mod tick;

pub use board::{Board, Pin, PinGrid};
pub use collision::{CollisionResult, ball_pin_collision, reflect_velocity, resolve_ball_pair};
pub use config::SimulationConfig;
pub use event::{Contact, Settled, SimEvent};
pub use fallback::round_robin;
pub use runner::{Simulator, StopHandle};
pub use state::{Ball, BallPhase, BallSnapshot, DropState, Snapshot};
pub use tick::{bucket_index, run_until_settled, tick};
