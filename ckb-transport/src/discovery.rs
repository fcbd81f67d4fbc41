//! Device discovery for Corsair keyboards and mice

use std::sync::Arc;

use hidapi::HidApi;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::device_registry;
use crate::error::TransportError;
use crate::hid::HidTransport;
use crate::types::{DiscoveredDevice, TransportDeviceInfo};
use crate::BoxedTransport;

/// Generic desktop usage page (boot keyboard/mouse interfaces)
const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
/// Vendor-defined usage pages start here
const USAGE_PAGE_VENDOR_MIN: u16 = 0xFF00;

/// HID device discovery
pub struct HidDiscovery {
    api: Mutex<HidApi>,
}

impl HidDiscovery {
    /// Create a new discovery instance
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            api: Mutex::new(HidApi::new()?),
        })
    }

    /// List currently attached supported devices
    ///
    /// Interfaces are grouped per physical device by VID/PID/serial. A device
    /// is only reported once its vendor (command) interface is visible.
    pub fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        let mut found: Vec<DiscoveredDevice> = Vec::new();
        let mut inputs: Vec<(u16, u16, Option<String>, String)> = Vec::new();

        for dev in api.device_list() {
            let (vid, pid) = (dev.vendor_id(), dev.product_id());
            if !device_registry::is_supported(vid, pid) {
                continue;
            }
            let path = dev.path().to_string_lossy().into_owned();
            let serial = dev.serial_number().map(str::to_owned);

            if dev.usage_page() >= USAGE_PAGE_VENDOR_MIN {
                if found
                    .iter()
                    .any(|d| d.info.vid == vid && d.info.pid == pid && d.info.serial == serial)
                {
                    continue;
                }
                debug!("Found {:04x}:{:04x} command interface at {}", vid, pid, path);
                found.push(DiscoveredDevice {
                    info: TransportDeviceInfo {
                        vid,
                        pid,
                        device_path: path,
                        serial,
                        product_name: dev.product_string().map(str::to_owned),
                    },
                    input_path: None,
                });
            } else if dev.usage_page() == USAGE_PAGE_GENERIC_DESKTOP {
                inputs.push((vid, pid, serial, path));
            }
        }

        for device in &mut found {
            device.input_path = inputs
                .iter()
                .find(|(vid, pid, serial, _)| {
                    *vid == device.info.vid && *pid == device.info.pid && *serial == device.info.serial
                })
                .map(|(_, _, _, path)| path.clone());
            if device.input_path.is_none() {
                warn!(
                    "No input interface for {:04x}:{:04x}, key events unavailable",
                    device.info.vid, device.info.pid
                );
            }
        }

        Ok(found)
    }

    /// Open a discovered device
    pub fn open_device(&self, device: &DiscoveredDevice) -> Result<BoxedTransport, TransportError> {
        let api = self.api.lock();
        Ok(Arc::new(HidTransport::open(&api, device)?))
    }
}
