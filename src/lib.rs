//! Color Drop - drop colored balls through a pin field to build a palette
//!
//! Core modules:
//! - `sim`: Pin-field physics (board geometry, tick, collisions, threaded runner)
//! - `palette`: Buckets that collect settled balls and reduce them to a palette
//! - `color`: RGB colors, hex parsing and contact mixing
//! - `settings`: Host preferences (gravity style, container weights) and JSON loading

pub mod color;
pub mod palette;
pub mod settings;
pub mod sim;

pub use color::{Rgb, mix, mix_all};
pub use palette::{Bucket, BucketSet, PaletteMode};
pub use settings::{ContainerWeight, GravityStyle, Settings};

/// Simulation defaults
pub mod consts {
    /// Nominal tick rate (60 Hz)
    pub const FRAME_INTERVAL: f32 = 1.0 / 60.0;
    /// Largest wall-clock delta a single tick will integrate
    pub const MAX_DT: f32 = 0.1;
    /// Upper bound accepted for the tick interval and `MAX_DT`
    pub const MAX_FRAME_INTERVAL: f32 = 1.0;

    /// Board dimensions
    pub const BOARD_WIDTH: f32 = 300.0;
    pub const BOARD_HEIGHT: f32 = 300.0;

    /// Ball and pin sizes
    pub const BALL_RADIUS: f32 = 10.0;
    pub const PIN_RADIUS: f32 = 3.0;

    /// Staggered pin grid
    pub const PIN_ROWS: usize = 6;
    pub const PINS_PER_ROW: usize = 8;
    pub const PIN_SPACING: f32 = 35.0;
    pub const PIN_TOP_OFFSET: f32 = 20.0;

    /// Gravity (pixels/s²) and bounce damping
    pub const GRAVITY: f32 = 800.0;
    pub const BOUNCE_DAMPING: f32 = 0.6;

    /// Random kick added on every pin bounce (pixels/s, symmetric range)
    pub const PIN_JITTER_X: f32 = 50.0;
    pub const PIN_JITTER_Y: f32 = 10.0;

    /// Distance above the floor where buckets start pulling
    pub const ATTRACTION_MARGIN: f32 = 80.0;
    /// Base horizontal pull toward a bucket center (pixels/s²)
    pub const ATTRACTION_STRENGTH: f32 = 300.0;
    /// Buckets further than this many widths from a ball do not pull it
    pub const ATTRACTION_RANGE_BUCKETS: f32 = 1.5;

    /// Per-tick horizontal velocity multiplier on the floor
    pub const FLOOR_FRICTION: f32 = 0.9;
    /// Horizontal speed under which a grounded ball is at rest
    pub const REST_SPEED: f32 = 5.0;
    /// Smallest upward share of a contact normal for a resting ball to hold
    /// another one up
    pub const PILE_SUPPORT_NORMAL_Y: f32 = 0.35;

    /// Distances below this are treated as coincident
    pub const COLLISION_EPSILON: f32 = 1e-3;

    /// Default number of buckets (containers)
    pub const BUCKET_COUNT: usize = 6;

    /// Spawn row used by the original layout (reference width 300)
    pub const SPAWN_Y: f32 = 20.0;
}
