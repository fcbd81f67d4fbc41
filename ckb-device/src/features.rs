//! Device capability flags

use bitflags::bitflags;

bitflags! {
    /// What a device supports, fixed at detection time
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        /// RGB backlighting
        const RGB = 0x01;
        /// Known poll rate
        const POLLRATE = 0x02;
        /// Rebindable keys
        const BIND = 0x04;
        /// Key notifications
        const NOTIFY = 0x08;
        /// Reports a firmware version
        const FWVERSION = 0x10;
        /// Accepts firmware updates
        const FWUPDATE = 0x20;

        const COMMON = Self::BIND.bits() | Self::NOTIFY.bits() | Self::FWVERSION.bits();
        const STD_RGB = Self::COMMON.bits() | Self::RGB.bits() | Self::POLLRATE.bits() | Self::FWUPDATE.bits();
        const STD_NRGB = Self::COMMON.bits();
    }
}

/// Tokens published in the `features` node, in publication order
const FEATURE_TOKENS: [(Features, &str); 6] = [
    (Features::RGB, "rgb"),
    (Features::POLLRATE, "pollrate"),
    (Features::BIND, "bind"),
    (Features::NOTIFY, "notify"),
    (Features::FWVERSION, "fwversion"),
    (Features::FWUPDATE, "fwupdate"),
];

impl Features {
    /// Space-separated capability tokens
    pub fn tokens(&self) -> String {
        FEATURE_TOKENS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
