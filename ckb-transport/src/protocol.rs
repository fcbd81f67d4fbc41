//! Protocol constants and packet helpers for Corsair device communication

use crate::error::TransportError;

/// Size of every command/response packet (without HID report ID)
pub const MSG_SIZE: usize = 64;

/// A single fixed-size command or response frame
pub type Packet = [u8; MSG_SIZE];

/// Command bytes (first byte of every packet)
pub mod cmd {
    /// Write/set commands
    pub const WRITE: u8 = 0x07;
    /// Read/get commands
    pub const READ: u8 = 0x0E;

    /// Second byte: software/hardware control selector
    pub const CTRL_MODE: u8 = 0x04;
    /// Second byte: lighting on/off (mice)
    pub const LIGHT_ENABLE: u8 = 0x05;
    /// Second byte: per-zone colors (mice)
    pub const ZONE_COLORS: u8 = 0x22;
    /// Second byte of a READ: identification block (firmware, poll rate)
    pub const IDENT: u8 = 0x01;

    /// Values for `CTRL_MODE`
    pub const MODE_HARDWARE: u8 = 0x01;
    pub const MODE_SOFTWARE: u8 = 0x02;

    /// Get human-readable name for a (command, subcommand) pair
    pub fn name(command: u8, sub: u8) -> &'static str {
        match (command, sub) {
            (WRITE, CTRL_MODE) => "SET_CTRL_MODE",
            (WRITE, LIGHT_ENABLE) => "SET_LIGHT_ENABLE",
            (WRITE, ZONE_COLORS) => "SET_ZONE_COLORS",
            (READ, IDENT) => "GET_IDENT",
            _ => "UNKNOWN",
        }
    }
}

/// Build a zero-padded packet from a prefix
pub fn packet(prefix: &[u8]) -> Result<Packet, TransportError> {
    if prefix.len() > MSG_SIZE {
        return Err(TransportError::InvalidPacket(format!(
            "{} bytes exceeds packet size {}",
            prefix.len(),
            MSG_SIZE
        )));
    }
    let mut buf = [0u8; MSG_SIZE];
    buf[..prefix.len()].copy_from_slice(prefix);
    Ok(buf)
}

/// Prepend the HID report ID expected by hidapi writes
pub fn with_report_id(packet: &Packet) -> [u8; MSG_SIZE + 1] {
    let mut buf = [0u8; MSG_SIZE + 1];
    buf[1..].copy_from_slice(packet);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_padding() {
        let p = packet(&[cmd::WRITE, cmd::CTRL_MODE, cmd::MODE_SOFTWARE]).unwrap();
        assert_eq!(&p[..3], &[0x07, 0x04, 0x02]);
        assert!(p[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_packet_too_long() {
        assert!(packet(&[0u8; MSG_SIZE + 1]).is_err());
    }

    #[test]
    fn test_report_id_prefix() {
        let p = packet(&[0x0E, 0x01]).unwrap();
        let buf = with_report_id(&p);
        assert_eq!(buf[0], 0);
        assert_eq!(&buf[1..3], &[0x0E, 0x01]);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(cmd::name(0x07, 0x22), "SET_ZONE_COLORS");
        assert_eq!(cmd::name(0x0E, 0x01), "GET_IDENT");
        assert_eq!(cmd::name(0xFF, 0x00), "UNKNOWN");
    }
}
