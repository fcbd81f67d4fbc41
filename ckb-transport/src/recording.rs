//! In-memory transport that records traffic instead of touching hardware
//!
//! Used by tests to stand in for a device. Sent packets are kept
//! in order; failures, query responses and input reports can be scripted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::protocol::Packet;
use crate::types::TransportDeviceInfo;
use crate::Transport;

pub struct RecordingTransport {
    info: TransportDeviceInfo,
    sent: Mutex<Vec<Packet>>,
    leds: Mutex<Vec<u8>>,
    /// Sends left before every further send fails (None = never fail)
    sends_until_failure: Mutex<Option<usize>>,
    responses: Mutex<VecDeque<Packet>>,
    inputs: Mutex<VecDeque<Vec<u8>>>,
    disconnected: AtomicBool,
}

impl RecordingTransport {
    pub fn new(vid: u16, pid: u16) -> Self {
        Self {
            info: TransportDeviceInfo {
                vid,
                pid,
                device_path: format!("recording:{vid:04x}:{pid:04x}"),
                serial: None,
                product_name: None,
            },
            sent: Mutex::new(Vec::new()),
            leds: Mutex::new(Vec::new()),
            sends_until_failure: Mutex::new(None),
            responses: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(VecDeque::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Set the serial number reported in `device_info`
    pub fn with_serial(mut self, serial: &str) -> Self {
        self.info.serial = Some(serial.to_string());
        self
    }

    /// Override the device path reported in `device_info`
    pub fn with_path(mut self, path: &str) -> Self {
        self.info.device_path = path.to_string();
        self
    }

    /// Packets sent so far, oldest first
    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().clone()
    }

    /// Indicator bytes written so far
    pub fn leds(&self) -> Vec<u8> {
        self.leds.lock().clone()
    }

    /// Forget recorded traffic
    pub fn clear(&self) {
        self.sent.lock().clear();
        self.leds.lock().clear();
    }

    /// Let `n` more sends succeed, then fail every send
    pub fn fail_after(&self, n: usize) {
        *self.sends_until_failure.lock() = Some(n);
    }

    /// Stop injecting send failures
    pub fn heal(&self) {
        *self.sends_until_failure.lock() = None;
    }

    /// Queue a response for the next `query`
    pub fn push_response(&self, packet: Packet) {
        self.responses.lock().push_back(packet);
    }

    /// Queue a raw input report for `read_input`
    pub fn push_input(&self, report: &[u8]) {
        self.inputs.lock().push_back(report.to_vec());
    }

    /// Make every further call report a disconnect
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    fn check_connected(&self) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        self.check_connected()?;
        let mut remaining = self.sends_until_failure.lock();
        if let Some(n) = remaining.as_mut() {
            if *n == 0 {
                return Err(TransportError::HidError("injected send failure".into()));
            }
            *n -= 1;
        }
        self.sent.lock().push(*packet);
        Ok(())
    }

    fn query(&self, packet: &Packet) -> Result<Packet, TransportError> {
        self.send(packet)?;
        self.responses.lock().pop_front().ok_or(TransportError::Timeout)
    }

    fn read_input(&self, timeout_ms: i32) -> Result<Option<Vec<u8>>, TransportError> {
        self.check_connected()?;
        if let Some(report) = self.inputs.lock().pop_front() {
            return Ok(Some(report));
        }
        std::thread::sleep(Duration::from_millis(timeout_ms.clamp(0, 10) as u64));
        Ok(None)
    }

    fn set_leds(&self, leds: u8) -> Result<(), TransportError> {
        self.check_connected()?;
        self.leds.lock().push(leds);
        Ok(())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}
