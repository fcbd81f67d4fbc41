//! Key and lighting address space
//!
//! Input positions cover keyboard keys (0..N_KEYS_HW) followed by mouse
//! buttons. Lighting indices cover keyboard keys (0..N_KEYS_KB) followed by
//! the mouse zones starting at [`LED_MOUSE`].
//!
//! Keyboard keys sit at their HID usage code, modifiers at 120..128.

/// Hardware key positions on the largest keyboard
pub const N_KEYS_HW: usize = 144;
/// Extra lighting-only key positions
pub const N_KEYS_EXTRA: usize = 12;
/// Total keyboard lighting positions
pub const N_KEYS_KB: usize = N_KEYS_HW + N_KEYS_EXTRA;
/// Mouse button positions following the keyboard keys
pub const N_BUTTONS_HW: usize = 20;
/// Total input positions (keys + buttons)
pub const N_KEYS_INPUT: usize = N_KEYS_HW + N_BUTTONS_HW;
/// Bytes needed for an input-position bitset
pub const N_KEYBYTES_INPUT: usize = N_KEYS_INPUT.div_ceil(8);

/// First lighting index of the mouse zones
pub const LED_MOUSE: usize = N_KEYS_KB;
/// Zones driven by the mouse lighting protocol
pub const N_MOUSE_ZONES: usize = 4;
/// Zones reserved in the lighting buffer
pub const N_MOUSE_ZONES_EXTENDED: usize = 6;
/// Length of each lighting channel
pub const N_LIGHTS: usize = N_KEYS_KB + N_MOUSE_ZONES_EXTENDED;

/// First input position of the mouse buttons
pub const MOUSE_BUTTON_FIRST: usize = N_KEYS_HW;
/// Input position of the left control key (first modifier)
pub const MODIFIER_FIRST: usize = 120;

/// A named input position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: &'static str,
    /// Input position (also the lighting index for keyboard keys)
    pub position: usize,
    /// Linux input scancode injected by default
    pub scan: u16,
}

const fn key(name: &'static str, position: usize, scan: u16) -> KeyInfo {
    KeyInfo {
        name,
        position,
        scan,
    }
}

/// Named input positions
pub const KEYMAP: &[KeyInfo] = &[
    key("a", 0x04, 30),
    key("b", 0x05, 48),
    key("c", 0x06, 46),
    key("d", 0x07, 32),
    key("e", 0x08, 18),
    key("f", 0x09, 33),
    key("g", 0x0A, 34),
    key("h", 0x0B, 35),
    key("i", 0x0C, 23),
    key("j", 0x0D, 36),
    key("k", 0x0E, 37),
    key("l", 0x0F, 38),
    key("m", 0x10, 50),
    key("n", 0x11, 49),
    key("o", 0x12, 24),
    key("p", 0x13, 25),
    key("q", 0x14, 16),
    key("r", 0x15, 19),
    key("s", 0x16, 31),
    key("t", 0x17, 20),
    key("u", 0x18, 22),
    key("v", 0x19, 47),
    key("w", 0x1A, 17),
    key("x", 0x1B, 45),
    key("y", 0x1C, 21),
    key("z", 0x1D, 44),
    key("1", 0x1E, 2),
    key("2", 0x1F, 3),
    key("3", 0x20, 4),
    key("4", 0x21, 5),
    key("5", 0x22, 6),
    key("6", 0x23, 7),
    key("7", 0x24, 8),
    key("8", 0x25, 9),
    key("9", 0x26, 10),
    key("0", 0x27, 11),
    key("enter", 0x28, 28),
    key("esc", 0x29, 1),
    key("bspace", 0x2A, 14),
    key("tab", 0x2B, 15),
    key("space", 0x2C, 57),
    key("minus", 0x2D, 12),
    key("equal", 0x2E, 13),
    key("lbrace", 0x2F, 26),
    key("rbrace", 0x30, 27),
    key("bslash", 0x31, 43),
    key("colon", 0x33, 39),
    key("quote", 0x34, 40),
    key("grave", 0x35, 41),
    key("comma", 0x36, 51),
    key("dot", 0x37, 52),
    key("slash", 0x38, 53),
    key("caps", 0x39, 58),
    key("f1", 0x3A, 59),
    key("f2", 0x3B, 60),
    key("f3", 0x3C, 61),
    key("f4", 0x3D, 62),
    key("f5", 0x3E, 63),
    key("f6", 0x3F, 64),
    key("f7", 0x40, 65),
    key("f8", 0x41, 66),
    key("f9", 0x42, 67),
    key("f10", 0x43, 68),
    key("f11", 0x44, 87),
    key("f12", 0x45, 88),
    key("prtscn", 0x46, 99),
    key("scroll", 0x47, 70),
    key("pause", 0x48, 119),
    key("ins", 0x49, 110),
    key("home", 0x4A, 102),
    key("pgup", 0x4B, 104),
    key("del", 0x4C, 111),
    key("end", 0x4D, 107),
    key("pgdn", 0x4E, 109),
    key("right", 0x4F, 106),
    key("left", 0x50, 105),
    key("down", 0x51, 108),
    key("up", 0x52, 103),
    key("numlock", 0x53, 69),
    key("lctrl", MODIFIER_FIRST, 29),
    key("lshift", MODIFIER_FIRST + 1, 42),
    key("lalt", MODIFIER_FIRST + 2, 56),
    key("lwin", MODIFIER_FIRST + 3, 125),
    key("rctrl", MODIFIER_FIRST + 4, 97),
    key("rshift", MODIFIER_FIRST + 5, 54),
    key("ralt", MODIFIER_FIRST + 6, 100),
    key("rwin", MODIFIER_FIRST + 7, 126),
    key("mouse1", MOUSE_BUTTON_FIRST, 0x110),
    key("mouse2", MOUSE_BUTTON_FIRST + 1, 0x111),
    key("mouse3", MOUSE_BUTTON_FIRST + 2, 0x112),
    key("mouse4", MOUSE_BUTTON_FIRST + 3, 0x113),
    key("mouse5", MOUSE_BUTTON_FIRST + 4, 0x114),
    key("mouse6", MOUSE_BUTTON_FIRST + 5, 0x115),
    key("mouse7", MOUSE_BUTTON_FIRST + 6, 0x116),
    key("mouse8", MOUSE_BUTTON_FIRST + 7, 0x117),
];

/// Lighting-only mouse zone names, in zone order
pub const MOUSE_ZONES: [&str; N_MOUSE_ZONES_EXTENDED] =
    ["front", "back", "dpi", "wheel", "thumb", "side"];

/// Find a named input position
pub fn key_by_name(name: &str) -> Option<&'static KeyInfo> {
    KEYMAP.iter().find(|k| k.name.eq_ignore_ascii_case(name))
}

/// Find the key at an input position
pub fn key_at(position: usize) -> Option<&'static KeyInfo> {
    KEYMAP.iter().find(|k| k.position == position)
}

/// Name for an input position, `#<n>` when unnamed
pub fn position_name(position: usize) -> String {
    match key_at(position) {
        Some(k) => k.name.to_string(),
        None => format!("#{position}"),
    }
}

/// Resolve an input position from a name or `#<n>`
pub fn input_position(name: &str) -> Option<usize> {
    if let Some(index) = name.strip_prefix('#') {
        return index.parse().ok().filter(|&p| p < N_KEYS_INPUT);
    }
    key_by_name(name).map(|k| k.position)
}

/// Resolve a lighting index from a key name, mouse zone name or `#<n>`
pub fn light_index(name: &str) -> Option<usize> {
    if let Some(index) = name.strip_prefix('#') {
        return index.parse().ok().filter(|&i| i < N_LIGHTS);
    }
    if let Some(zone) = MOUSE_ZONES.iter().position(|z| z.eq_ignore_ascii_case(name)) {
        return Some(LED_MOUSE + zone);
    }
    key_by_name(name)
        .map(|k| k.position)
        .filter(|&p| p < N_KEYS_HW)
}

/// Name for a lighting index, `#<n>` when unnamed
pub fn light_name(index: usize) -> String {
    if (LED_MOUSE..N_LIGHTS).contains(&index) {
        return MOUSE_ZONES[index - LED_MOUSE].to_string();
    }
    match key_at(index) {
        Some(k) if index < N_KEYS_HW => k.name.to_string(),
        _ => format!("#{index}"),
    }
}

/// Default scancode bound to an input position
pub fn default_scan(position: usize) -> Option<u16> {
    key_at(position).map(|k| k.scan)
}

/// Input position for a HID keyboard usage code
pub fn position_for_usage(usage: u8) -> Option<usize> {
    match usage {
        0x04..=0x73 => Some(usage as usize),
        0xE0..=0xE7 => Some(MODIFIER_FIRST + (usage - 0xE0) as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(N_KEYS_KB, 156);
        assert_eq!(N_KEYS_INPUT, 164);
        assert_eq!(N_KEYBYTES_INPUT, 21);
        assert_eq!(N_LIGHTS, 162);
        assert!(LED_MOUSE + N_MOUSE_ZONES <= N_LIGHTS);
    }

    #[test]
    fn test_positions_unique_and_in_range() {
        for (i, a) in KEYMAP.iter().enumerate() {
            assert!(a.position < N_KEYS_INPUT, "{} out of range", a.name);
            for b in &KEYMAP[i + 1..] {
                assert_ne!(a.position, b.position, "{} and {}", a.name, b.name);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(input_position("a"), Some(0x04));
        assert_eq!(input_position("LCTRL"), Some(MODIFIER_FIRST));
        assert_eq!(input_position("#7"), Some(7));
        assert_eq!(input_position("#999"), None);
        assert_eq!(input_position("nosuchkey"), None);
        assert_eq!(position_name(0x04), "a");
        assert_eq!(position_name(3), "#3");
    }

    #[test]
    fn test_light_lookup() {
        assert_eq!(light_index("front"), Some(LED_MOUSE));
        assert_eq!(light_index("wheel"), Some(LED_MOUSE + 3));
        assert_eq!(light_index("esc"), Some(0x29));
        assert_eq!(light_index("mouse1"), None);
        assert_eq!(light_name(LED_MOUSE + 2), "dpi");
        assert_eq!(light_name(0x29), "esc");
    }

    #[test]
    fn test_usage_mapping() {
        assert_eq!(position_for_usage(0x04), Some(0x04));
        assert_eq!(position_for_usage(0xE1), Some(MODIFIER_FIRST + 1));
        assert_eq!(position_for_usage(0x00), None);
        assert_eq!(position_for_usage(0x01), None);
    }
}
