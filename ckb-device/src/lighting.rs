//! RGB lighting buffers

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::keymap::{LED_MOUSE, N_LIGHTS, N_MOUSE_ZONES};

/// RGB color value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Create a new RGB color
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }

    /// Black (all LEDs off)
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    /// White (all LEDs full)
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };
}

/// Parses `rrggbb` hex
impl FromStr for RgbColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.is_ascii() {
            return Err(format!("expected rrggbb, got {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| format!("bad hex color {s:?}"))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Lighting state for one mode
///
/// Three parallel channels indexed by the unified key + zone address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lighting {
    pub r: [u8; N_LIGHTS],
    pub g: [u8; N_LIGHTS],
    pub b: [u8; N_LIGHTS],
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            r: [0; N_LIGHTS],
            g: [0; N_LIGHTS],
            b: [0; N_LIGHTS],
        }
    }
}

/// Lighting indices driven by the mouse protocol
pub const MOUSE_ZONE_RANGE: Range<usize> = LED_MOUSE..LED_MOUSE + N_MOUSE_ZONES;

impl Lighting {
    pub fn get(&self, index: usize) -> Option<RgbColor> {
        (index < N_LIGHTS).then(|| RgbColor::new(self.r[index], self.g[index], self.b[index]))
    }

    /// Set one index; out-of-range indices are ignored
    pub fn set(&mut self, index: usize, color: RgbColor) {
        if index < N_LIGHTS {
            self.r[index] = color.r;
            self.g[index] = color.g;
            self.b[index] = color.b;
        }
    }

    /// Compare all three channels over a range
    pub fn range_eq(&self, other: &Lighting, range: Range<usize>) -> bool {
        self.r[range.clone()] == other.r[range.clone()]
            && self.g[range.clone()] == other.g[range.clone()]
            && self.b[range.clone()] == other.b[range]
    }

    /// True when every byte of all three channels in `range` is zero
    pub fn is_black(&self, range: Range<usize>) -> bool {
        self.r[range.clone()].iter().all(|&v| v == 0)
            && self.g[range.clone()].iter().all(|&v| v == 0)
            && self.b[range].iter().all(|&v| v == 0)
    }
}
