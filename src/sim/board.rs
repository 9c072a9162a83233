//! Board geometry: dimensions, radii and the staggered pin field
//!
//! A board is immutable once built. Changing its size produces a new board
//! with a recomputed pin layout.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// A fixed pin (radius is board-wide)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub pos: Vec2,
}

/// Staggered pin grid description
///
/// Even rows hold `per_row` pins, odd rows one fewer and are shifted by half
/// a spacing, so every pin sits over a gap of the row above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinGrid {
    pub rows: usize,
    pub per_row: usize,
    /// Distance between neighbouring pins, horizontally and vertically
    pub spacing: f32,
    /// Distance from the top edge to the first row's cell
    pub top_offset: f32,
}

impl Default for PinGrid {
    fn default() -> Self {
        Self {
            rows: PIN_ROWS,
            per_row: PINS_PER_ROW,
            spacing: PIN_SPACING,
            top_offset: PIN_TOP_OFFSET,
        }
    }
}

impl PinGrid {
    /// Lay out pins centered horizontally on a board of the given width
    pub fn layout(&self, width: f32) -> Vec<Pin> {
        let mut pins = Vec::new();
        if self.per_row == 0 {
            return pins;
        }
        let row_span = (self.per_row - 1) as f32 * self.spacing;
        let left = (width - row_span) / 2.0;

        for row in 0..self.rows {
            let staggered = row % 2 == 1;
            let count = if staggered { self.per_row - 1 } else { self.per_row };
            let x0 = if staggered { left + self.spacing / 2.0 } else { left };
            let y = self.top_offset + self.spacing / 2.0 + row as f32 * self.spacing;
            for col in 0..count {
                let x = x0 + col as f32 * self.spacing;
                // Pins that would land outside the board are dropped
                if x > 0.0 && x < width {
                    pins.push(Pin { pos: Vec2::new(x, y) });
                }
            }
        }
        pins
    }
}

/// Immutable board geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f32,
    pub height: f32,
    pub ball_radius: f32,
    pub pin_radius: f32,
    /// Grid the pins were generated from (`None` for hand-placed pins)
    pub grid: Option<PinGrid>,
    pins: Vec<Pin>,
}

impl Default for Board {
    fn default() -> Self {
        Self::with_grid(BOARD_WIDTH, BOARD_HEIGHT, BALL_RADIUS, PIN_RADIUS, PinGrid::default())
    }
}

impl Board {
    /// Board without any pins
    pub fn empty(width: f32, height: f32, ball_radius: f32, pin_radius: f32) -> Self {
        Self {
            width,
            height,
            ball_radius,
            pin_radius,
            grid: None,
            pins: Vec::new(),
        }
    }

    /// Board with a staggered pin grid
    pub fn with_grid(width: f32, height: f32, ball_radius: f32, pin_radius: f32, grid: PinGrid) -> Self {
        Self {
            width,
            height,
            ball_radius,
            pin_radius,
            grid: Some(grid),
            pins: grid.layout(width),
        }
    }

    /// Board with explicitly placed pins
    pub fn with_pins(mut self, pins: Vec<Pin>) -> Self {
        self.grid = None;
        self.pins = pins;
        self
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Same board at a new size; grid pins are laid out again
    pub fn resized(&self, width: f32, height: f32) -> Self {
        match self.grid {
            Some(grid) => Self::with_grid(width, height, self.ball_radius, self.pin_radius, grid),
            None => Self {
                width,
                height,
                ..self.clone()
            },
        }
    }

    /// Y coordinate of a resting ball's center
    #[inline]
    pub fn floor_y(&self) -> f32 {
        self.height - self.ball_radius
    }

    /// Legal horizontal range of a ball's center
    #[inline]
    pub fn x_bounds(&self) -> (f32, f32) {
        (self.ball_radius, self.width - self.ball_radius)
    }

    /// Spawn positions for `count` balls along the top edge
    ///
    /// Follows the classic layout `x = clamp((50 + 50 i) mod 250, 50, 250)`
    /// on a 300 px wide board, scaled to this board's width.
    pub fn spawn_positions(&self, count: usize) -> Vec<Vec2> {
        let scale = self.width / BOARD_WIDTH;
        let (min_x, max_x) = self.x_bounds();
        (0..count)
            .map(|i| {
                let reference = ((50 + i * 50) % 250) as f32;
                let x = (reference.clamp(50.0, 250.0) * scale).clamp(min_x, max_x.max(min_x));
                let y = SPAWN_Y.max(self.ball_radius).min(self.floor_y());
                Vec2::new(x, y)
            })
            .collect()
    }
}
