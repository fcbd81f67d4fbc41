//! Input snapshots and report decoding

use ckb_transport::DeviceKind;

use crate::keymap::{position_for_usage, MOUSE_BUTTON_FIRST, N_KEYBYTES_INPUT, N_KEYS_INPUT};

/// Bitset over input positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyBits([u8; N_KEYBYTES_INPUT]);

impl KeyBits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every input position set
    pub fn all() -> Self {
        let mut bits = Self::new();
        for position in 0..N_KEYS_INPUT {
            bits.set(position);
        }
        bits
    }

    pub fn get(&self, position: usize) -> bool {
        position < N_KEYS_INPUT && self.0[position / 8] & (1 << (position % 8)) != 0
    }

    pub fn set(&mut self, position: usize) {
        if position < N_KEYS_INPUT {
            self.0[position / 8] |= 1 << (position % 8);
        }
    }

    pub fn clear(&mut self, position: usize) {
        if position < N_KEYS_INPUT {
            self.0[position / 8] &= !(1 << (position % 8));
        }
    }

    pub fn assign(&mut self, position: usize, on: bool) {
        if on {
            self.set(position);
        } else {
            self.clear(position);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// True when every position set in `other` is also set here
    pub fn contains_all(&self, other: &KeyBits) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a & b == *b)
    }

    /// Positions set, ascending
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N_KEYS_INPUT).filter(move |&p| self.get(p))
    }

    /// Positions that differ between two sets, ascending
    pub fn changed(&self, other: &KeyBits) -> impl Iterator<Item = usize> + '_ {
        let other = *other;
        (0..N_KEYS_INPUT).filter(move |&p| self.get(p) != other.get(p))
    }
}

/// Current input state of a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub keys: KeyBits,
    pub prev_keys: KeyBits,
    pub rel_x: i16,
    pub rel_y: i16,
}

/// One decoded input report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputReport {
    pub keys: KeyBits,
    pub rel_x: i16,
    pub rel_y: i16,
}

/// Decode a raw boot-protocol report
///
/// Keyboards: `[modifiers, reserved, usage * 6]`.
/// Mice: `[buttons, dx_lo, dx_hi, dy_lo, dy_hi, ...]`.
pub fn decode_report(kind: DeviceKind, report: &[u8]) -> Option<InputReport> {
    let mut decoded = InputReport::default();
    match kind {
        DeviceKind::Keyboard => {
            if report.len() < 8 {
                return None;
            }
            for bit in 0..8 {
                if report[0] & (1 << bit) != 0 {
                    if let Some(position) = position_for_usage(0xE0 + bit) {
                        decoded.keys.set(position);
                    }
                }
            }
            // 0x01 in every slot is the rollover error report, keep old state
            if report[2..8].iter().all(|&u| u == 0x01) {
                return None;
            }
            for &usage in &report[2..8] {
                if let Some(position) = position_for_usage(usage) {
                    decoded.keys.set(position);
                }
            }
        }
        DeviceKind::Mouse => {
            if report.len() < 5 {
                return None;
            }
            for bit in 0..8 {
                if report[0] & (1 << bit) != 0 {
                    decoded.keys.set(MOUSE_BUTTON_FIRST + bit);
                }
            }
            decoded.rel_x = i16::from_le_bytes([report[1], report[2]]);
            decoded.rel_y = i16::from_le_bytes([report[3], report[4]]);
        }
    }
    Some(decoded)
}
