//! Profiles, modes and hardware profile cache

use std::fmt;

use bitflags::bitflags;
use uuid::Uuid;

use crate::binding::Binding;
use crate::input::KeyBits;
use crate::lighting::Lighting;

/// Number of modes in a profile
pub const MODE_COUNT: usize = 6;
/// Maximum number of notification channels per device
pub const OUTFIFO_MAX: usize = 10;
/// Mode name length limit (characters)
pub const MD_NAME_LEN: usize = 16;
/// Profile name length limit (characters)
pub const PR_NAME_LEN: usize = 16;
/// Onboard hardware modes
pub const HWMODE_MAX: usize = 3;

/// Profile/mode identifier: GUID plus modification counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsbId {
    pub guid: [u8; 16],
    pub modified: [u8; 4],
}

impl UsbId {
    /// Fresh random identifier
    pub fn generate() -> Self {
        Self {
            guid: Uuid::new_v4().into_bytes(),
            modified: [0; 4],
        }
    }

    /// Bump the modification counter
    pub fn touch(&mut self) {
        let next = u32::from_le_bytes(self.modified).wrapping_add(1);
        self.modified = next.to_le_bytes();
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guid = Uuid::from_bytes(self.guid).hyphenated().to_string().to_uppercase();
        write!(f, "{{{}}} {:08x}", guid, u32::from_le_bytes(self.modified))
    }
}

bitflags! {
    /// Indicator LEDs
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Indicators: u8 {
        const NUM = 0x01;
        const CAPS = 0x02;
        const SCROLL = 0x04;
    }
}

impl Indicators {
    /// Parse `num`, `caps`, `scroll` or `all`
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "num" | "numlock" => Some(Self::NUM),
            "caps" | "capslock" => Some(Self::CAPS),
            "scroll" | "scrolllock" => Some(Self::SCROLL),
            "all" => Some(Self::all()),
            _ => None,
        }
    }

    /// Name of a single indicator flag
    pub fn name(&self) -> &'static str {
        if *self == Self::NUM {
            "num"
        } else if *self == Self::CAPS {
            "caps"
        } else if *self == Self::SCROLL {
            "scroll"
        } else {
            "?"
        }
    }
}

/// Truncate to a name length limit on a character boundary
pub fn truncate_name(name: &str, limit: usize) -> String {
    name.chars().take(limit).collect()
}

/// One mode of a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    pub light: Lighting,
    pub bind: Binding,
    pub id: UsbId,
    pub name: String,
    /// Key notification subscriptions per notification channel
    pub notify: [KeyBits; OUTFIFO_MAX],
    /// Indicators forced off
    pub ioff: Indicators,
    /// Indicators forced on
    pub ion: Indicators,
    /// Indicator notification subscriptions per notification channel
    pub inotify: [Indicators; OUTFIFO_MAX],
}

impl Mode {
    pub fn new() -> Self {
        Self {
            light: Lighting::default(),
            bind: Binding::default(),
            id: UsbId::generate(),
            name: String::new(),
            // Channel 0 receives every key event by default
            notify: std::array::from_fn(|i| if i == 0 { KeyBits::all() } else { KeyBits::new() }),
            ioff: Indicators::empty(),
            ion: Indicators::empty(),
            inotify: [Indicators::empty(); OUTFIFO_MAX],
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_name(name, MD_NAME_LEN);
        self.id.touch();
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::new()
    }
}

/// A profile: fixed set of modes plus the last lighting sent to hardware
#[derive(Debug, Clone)]
pub struct Profile {
    modes: [Mode; MODE_COUNT],
    current: usize,
    /// Last RGB data sent to the device
    pub last_light: Lighting,
    pub name: String,
    pub id: UsbId,
}

impl Profile {
    pub fn new() -> Self {
        let mut modes: [Mode; MODE_COUNT] = std::array::from_fn(|_| Mode::new());
        for (i, mode) in modes.iter_mut().enumerate() {
            mode.name = format!("Mode {}", i + 1);
        }
        Self {
            modes,
            current: 0,
            last_light: Lighting::default(),
            name: "Unnamed".to_string(),
            id: UsbId::generate(),
        }
    }

    /// Index of the current mode
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_mode(&self) -> &Mode {
        &self.modes[self.current]
    }

    pub fn current_mode_mut(&mut self) -> &mut Mode {
        &mut self.modes[self.current]
    }

    /// Make a mode current; out-of-range indices are rejected
    pub fn switch_to(&mut self, index: usize) -> bool {
        if index >= MODE_COUNT {
            return false;
        }
        self.current = index;
        true
    }

    pub fn mode(&self, index: usize) -> Option<&Mode> {
        self.modes.get(index)
    }

    pub fn mode_mut(&mut self, index: usize) -> Option<&mut Mode> {
        self.modes.get_mut(index)
    }

    pub fn modes(&self) -> &[Mode; MODE_COUNT] {
        &self.modes
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_name(name, PR_NAME_LEN);
        self.id.touch();
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the profile stored in the device's onboard memory
#[derive(Debug, Clone, Default)]
pub struct HwProfile {
    pub light: [Lighting; HWMODE_MAX],
    /// Profile id followed by one id per onboard mode
    pub id: [UsbId; HWMODE_MAX + 1],
    /// Profile name followed by one name per onboard mode
    pub name: [String; HWMODE_MAX + 1],
}
