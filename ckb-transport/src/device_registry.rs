//! Device registry - supported product table
//!
//! Single source of truth for which Corsair products the daemon drives and
//! what kind of device each one is. The daemon's device class (and with it
//! the packet layouts used) is derived from this table at detection time.

use crate::types::DeviceKind;

/// Corsair vendor ID
pub const VENDOR_ID: u16 = 0x1B1C;

/// A supported product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDevice {
    pub pid: u16,
    /// Model name published to clients
    pub model: &'static str,
    pub kind: DeviceKind,
    /// Has per-key/per-zone RGB lighting
    pub rgb: bool,
}

const fn keyboard(pid: u16, model: &'static str, rgb: bool) -> KnownDevice {
    KnownDevice {
        pid,
        model,
        kind: DeviceKind::Keyboard,
        rgb,
    }
}

const fn mouse(pid: u16, model: &'static str) -> KnownDevice {
    KnownDevice {
        pid,
        model,
        kind: DeviceKind::Mouse,
        rgb: true,
    }
}

/// All known products
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    keyboard(0x1B17, "Corsair K65 RGB Gaming Keyboard", true),
    keyboard(0x1B13, "Corsair K70 RGB Gaming Keyboard", true),
    keyboard(0x1B09, "Corsair K70 Gaming Keyboard", false),
    keyboard(0x1B11, "Corsair K95 RGB Gaming Keyboard", true),
    keyboard(0x1B08, "Corsair K95 Gaming Keyboard", false),
    keyboard(0x1B20, "Corsair STRAFE RGB Gaming Keyboard", true),
    keyboard(0x1B15, "Corsair STRAFE Gaming Keyboard", false),
    mouse(0x1B12, "Corsair M65 RGB Gaming Mouse"),
    mouse(0x1B2E, "Corsair M65 PRO RGB Gaming Mouse"),
    mouse(0x1B14, "Corsair Sabre RGB Gaming Mouse"),
    mouse(0x1B19, "Corsair Sabre RGB Laser Gaming Mouse"),
    mouse(0x1B2F, "Corsair Sabre RGB Optical Gaming Mouse"),
    mouse(0x1B1E, "Corsair Scimitar RGB Gaming Mouse"),
];

/// Look up a product by VID/PID
pub fn find_device(vid: u16, pid: u16) -> Option<&'static KnownDevice> {
    if vid != VENDOR_ID {
        return None;
    }
    KNOWN_DEVICES.iter().find(|d| d.pid == pid)
}

/// Check if a VID/PID is a supported product
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    find_device(vid, pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keyboards() {
        let k70 = find_device(0x1B1C, 0x1B13).unwrap();
        assert_eq!(k70.kind, DeviceKind::Keyboard);
        assert!(k70.rgb);
        let k70_plain = find_device(0x1B1C, 0x1B09).unwrap();
        assert!(!k70_plain.rgb);
    }

    #[test]
    fn test_known_mice() {
        let m65 = find_device(0x1B1C, 0x1B12).unwrap();
        assert_eq!(m65.kind, DeviceKind::Mouse);
        assert!(m65.rgb);
    }

    #[test]
    fn test_foreign_vendor_rejected() {
        assert!(!is_supported(0x3151, 0x1B13));
        assert!(!is_supported(0x1B1C, 0x0000));
    }

    #[test]
    fn test_pids_unique() {
        for (i, a) in KNOWN_DEVICES.iter().enumerate() {
            for b in &KNOWN_DEVICES[i + 1..] {
                assert_ne!(a.pid, b.pid, "duplicate pid {:04x}", a.pid);
            }
        }
    }
}
