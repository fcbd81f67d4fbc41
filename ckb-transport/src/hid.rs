//! HID transport implementation over hidapi

use std::ffi::CString;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{self, Packet, MSG_SIZE};
use crate::types::{DiscoveredDevice, TransportDeviceInfo};
use crate::Transport;

/// Number of write attempts before a send is reported as failed
const SEND_RETRIES: usize = 3;
/// Number of write/read cycles before a query times out
const QUERY_RETRIES: usize = 5;
/// Pause between retries
const RETRY_DELAY_MS: u64 = 20;
/// How long a query waits for its response report
const RESPONSE_TIMEOUT_MS: i32 = 500;

/// HID transport for a Corsair device
///
/// Commands go out on the vendor interface; input reports are read from the
/// boot-protocol interface when one exists.
pub struct HidTransport {
    /// Vendor interface for command packets
    command_device: Mutex<HidDevice>,
    /// Boot interface for key/button reports
    input_device: Option<Mutex<HidDevice>>,
    /// Device information
    info: TransportDeviceInfo,
}

impl HidTransport {
    /// Open both interfaces of a discovered device
    pub fn open(api: &HidApi, device: &DiscoveredDevice) -> Result<Self, TransportError> {
        let command_device = open_path(api, &device.info.device_path)?;
        let input_device = match &device.input_path {
            Some(path) => Some(Mutex::new(open_path(api, path)?)),
            None => None,
        };
        Ok(Self {
            command_device: Mutex::new(command_device),
            input_device,
            info: device.info.clone(),
        })
    }

    fn write_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        let buf = protocol::with_report_id(packet);
        let device = self.command_device.lock();
        let written = device.write(&buf)?;
        check_written(written, buf.len())
    }
}

/// A write must cover the report id and the whole packet
fn check_written(written: usize, len: usize) -> Result<(), TransportError> {
    if written < len {
        return Err(TransportError::HidError(format!(
            "short write: {written} of {len} bytes"
        )));
    }
    Ok(())
}

fn open_path(api: &HidApi, path: &str) -> Result<HidDevice, TransportError> {
    let cpath = CString::new(path)
        .map_err(|_| TransportError::DeviceNotFound(format!("invalid path {path:?}")))?;
    Ok(api.open_path(&cpath)?)
}

impl Transport for HidTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        debug!(
            "Sending {} ({:02X?})",
            protocol::cmd::name(packet[0], packet[1]),
            &packet[..8]
        );
        for attempt in 0..SEND_RETRIES {
            match self.write_packet(packet) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_disconnect() => return Err(e),
                Err(e) => {
                    debug!("Send attempt {} failed: {}", attempt, e);
                    if attempt == SEND_RETRIES - 1 {
                        return Err(e);
                    }
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
        }
        Ok(())
    }

    fn query(&self, packet: &Packet) -> Result<Packet, TransportError> {
        for attempt in 0..QUERY_RETRIES {
            if let Err(e) = self.write_packet(packet) {
                if e.is_disconnect() {
                    return Err(e);
                }
                debug!("Query write attempt {} failed: {}", attempt, e);
                continue;
            }
            let mut resp = [0u8; MSG_SIZE];
            let device = self.command_device.lock();
            match device.read_timeout(&mut resp, RESPONSE_TIMEOUT_MS) {
                Ok(len) if len > 0 && resp[0] == packet[0] => return Ok(resp),
                Ok(len) => debug!(
                    "Response mismatch ({} bytes): expected 0x{:02X}, got 0x{:02X}",
                    len, packet[0], resp[0]
                ),
                Err(e) => {
                    let e = TransportError::from(e);
                    if e.is_disconnect() {
                        return Err(e);
                    }
                    debug!("Read attempt {} failed: {}", attempt, e);
                }
            }
        }
        Err(TransportError::Timeout)
    }

    fn read_input(&self, timeout_ms: i32) -> Result<Option<Vec<u8>>, TransportError> {
        let Some(input) = &self.input_device else {
            std::thread::sleep(Duration::from_millis(timeout_ms.max(0) as u64));
            return Ok(None);
        };
        let mut buf = [0u8; MSG_SIZE];
        let len = input.lock().read_timeout(&mut buf, timeout_ms)?;
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(buf[..len].to_vec()))
    }

    fn set_leds(&self, leds: u8) -> Result<(), TransportError> {
        let Some(input) = &self.input_device else {
            return Ok(());
        };
        // Output report 0 on the boot interface carries the indicator byte
        input.lock().write(&[0, leds])?;
        Ok(())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_write_counts_report_id() {
        let buf = protocol::with_report_id(&[0u8; MSG_SIZE]);
        assert!(check_written(buf.len(), buf.len()).is_ok());
        // The packet alone, without its report id, is short
        assert!(check_written(MSG_SIZE, buf.len()).is_err());
        assert!(check_written(0, buf.len()).is_err());
    }
}
