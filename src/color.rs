//! RGB colors carried by balls
//!
//! Colors are opaque to the physics; only the palette and the spark effect
//! look inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Colors used when the host supplies fewer colors than buckets
pub const FALLBACK_COLORS: [Rgb; 7] = [
    Rgb::new(0xFF, 0x6B, 0x6B),
    Rgb::new(0x4E, 0xCD, 0xC4),
    Rgb::new(0x45, 0xB7, 0xD1),
    Rgb::new(0x6C, 0x5C, 0xE7),
    Rgb::new(0xFD, 0x79, 0xA8),
    Rgb::new(0xFD, 0xCB, 0x6E),
    Rgb::new(0x55, 0xE6, 0xC1),
];

/// An 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `RRGGBB` (surrounding whitespace ignored)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        let rgb = u32::from_str_radix(digits, 16).ok()?;
        Some(Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
    }

    /// Uppercase `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Perceived brightness in 0..=1
    pub fn brightness(&self) -> f32 {
        let [r, g, b] = self.to_unit();
        r * 0.299 + g * 0.587 + b * 0.114
    }

    fn to_unit(self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| c as f32 / 255.0)
    }

    fn to_linear(self) -> [f32; 3] {
        self.to_unit().map(srgb_to_linear)
    }

    fn from_linear(linear: [f32; 3]) -> Self {
        let [r, g, b] = linear.map(|c| (linear_to_srgb(c) * 255.0).round().clamp(0.0, 255.0) as u8);
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Mix two colors on contact (average in linear RGB)
pub fn mix(a: Rgb, b: Rgb) -> Rgb {
    let la = a.to_linear();
    let lb = b.to_linear();
    Rgb::from_linear([0, 1, 2].map(|i| (la[i] + lb[i]) * 0.5))
}

/// Average any number of colors in linear RGB; `None` for an empty slice
pub fn mix_all(colors: &[Rgb]) -> Option<Rgb> {
    match colors {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut sum = [0.0f32; 3];
            for color in colors {
                let linear = color.to_linear();
                for (acc, c) in sum.iter_mut().zip(linear) {
                    *acc += c;
                }
            }
            let n = colors.len() as f32;
            Some(Rgb::from_linear(sum.map(|c| c / n)))
        }
    }
}

/// Sort colors from darkest to lightest
pub fn sort_light_to_dark(colors: &mut [Rgb]) {
    colors.sort_by(|a, b| a.brightness().total_cmp(&b.brightness()));
}

/// Sort colors from lightest to darkest
pub fn sort_dark_to_light(colors: &mut [Rgb]) {
    colors.sort_by(|a, b| b.brightness().total_cmp(&a.brightness()));
}
