//! Transport abstraction layer for Corsair keyboard and mouse communication
//!
//! Everything above this crate talks to hardware through the [`Transport`]
//! trait: fixed-size 64-byte command packets out, optional responses and raw
//! input reports back.
//!
//! - HID (hidapi, vendor interface + boot input interface)
//! - Recording (in-memory, for tests)

pub mod device_registry;
pub mod error;
pub mod protocol;
pub mod recording;
pub mod types;

mod discovery;
mod hid;

pub use device_registry::{find_device, is_supported, KnownDevice, KNOWN_DEVICES, VENDOR_ID};
pub use discovery::HidDiscovery;
pub use error::TransportError;
pub use hid::HidTransport;
pub use protocol::{Packet, MSG_SIZE};
pub use recording::RecordingTransport;
pub use types::{DeviceKind, DiscoveredDevice, TransportDeviceInfo};

use std::sync::Arc;

/// The core transport trait - all backends implement this
///
/// Calls may block for the duration of one USB transaction. Implementations
/// serialize access internally, so one transport can be shared between a
/// device's input and command threads.
pub trait Transport: Send + Sync {
    /// Send a command packet without expecting a response
    fn send(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Send a command packet and wait for the matching response
    fn query(&self, packet: &Packet) -> Result<Packet, TransportError>;

    /// Read one raw input report
    ///
    /// # Arguments
    /// * `timeout_ms` - How long to wait for a report (0 for non-blocking)
    ///
    /// # Returns
    /// `None` on timeout, `Some(report)` if data was received
    fn read_input(&self, timeout_ms: i32) -> Result<Option<Vec<u8>>, TransportError>;

    /// Write the indicator LED byte (num/caps/scroll)
    fn set_leds(&self, leds: u8) -> Result<(), TransportError>;

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;
