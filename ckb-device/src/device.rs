//! Per-device record

use std::fs::File;
use std::time::Duration;

use ckb_transport::{BoxedTransport, DeviceKind, KnownDevice};

use crate::class::DeviceClass;
use crate::features::Features;
use crate::input::InputState;
use crate::profile::{HwProfile, Indicators, Profile, OUTFIFO_MAX};

/// Who a device is, as published to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub serial: String,
    pub vendor: u16,
    pub product: u16,
    /// Hot-plug location (HID path)
    pub location: String,
}

/// State of one connected device
pub struct Device {
    pub identity: DeviceIdentity,
    pub features: Features,
    pub class: DeviceClass,
    /// Under software control
    pub active: bool,
    pub fwversion: u16,
    pub pollrate: Option<Duration>,
    /// Command FIFO, read end
    pub cmd: Option<File>,
    /// Bumped whenever `cmd` is replaced by a new FIFO
    pub cmd_generation: u64,
    /// Notification FIFOs; empty slots are closed channels
    pub notify: [Option<File>; OUTFIFO_MAX],
    pub input: InputState,
    /// Indicators last written to the device
    pub ileds: Indicators,
    /// Indicators requested by the host
    pub os_ileds: Indicators,
    pub profile: Box<Profile>,
    pub hw: Option<Box<HwProfile>>,
    pub transport: BoxedTransport,
}

impl Device {
    /// Build a record for a freshly detected device
    pub fn new(transport: BoxedTransport, known: &KnownDevice) -> Self {
        let info = transport.device_info().clone();
        let name = info
            .product_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| known.model.to_string());
        let serial = info
            .serial
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{:04X}{:04X}", info.vid, info.pid));
        let features = if known.rgb {
            Features::STD_RGB
        } else {
            Features::STD_NRGB
        };

        Self {
            identity: DeviceIdentity {
                name,
                serial,
                vendor: info.vid,
                product: info.pid,
                location: info.device_path,
            },
            features,
            class: DeviceClass::from_known(known),
            active: false,
            fwversion: 0,
            pollrate: None,
            cmd: None,
            cmd_generation: 0,
            notify: std::array::from_fn(|_| None),
            input: InputState::default(),
            ileds: Indicators::empty(),
            os_ileds: Indicators::empty(),
            profile: Box::new(Profile::new()),
            hw: None,
            transport,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.class.kind()
    }

    /// Poll interval in whole milliseconds, 0 when unknown
    pub fn pollrate_ms(&self) -> u128 {
        self.pollrate.map(|d| d.as_millis()).unwrap_or(0)
    }

    /// Indices of open notification channels
    pub fn open_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.notify
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_some())
            .map(|(i, _)| i)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("identity", &self.identity)
            .field("class", &self.class)
            .field("active", &self.active)
            .field("fwversion", &self.fwversion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_transport::{find_device, RecordingTransport, VENDOR_ID};
    use std::sync::Arc;

    #[test]
    fn test_identity_fallbacks() {
        let known = find_device(VENDOR_ID, 0x1B13).unwrap();
        let dev = Device::new(Arc::new(RecordingTransport::new(VENDOR_ID, 0x1B13)), known);
        assert_eq!(dev.identity.name, "Corsair K70 RGB Gaming Keyboard");
        assert_eq!(dev.identity.serial, "1B1C1B13");
        assert_eq!(dev.class, DeviceClass::KeyboardRgb);
        assert!(dev.features.contains(Features::RGB));
        assert_eq!(dev.open_channels().count(), 0);
    }

    #[test]
    fn test_reported_serial_wins() {
        let known = find_device(VENDOR_ID, 0x1B12).unwrap();
        let t = RecordingTransport::new(VENDOR_ID, 0x1B12).with_serial("ABC123");
        let dev = Device::new(Arc::new(t), known);
        assert_eq!(dev.identity.serial, "ABC123");
        assert_eq!(dev.kind(), DeviceKind::Mouse);
        assert_eq!(dev.pollrate_ms(), 0);
    }
}
