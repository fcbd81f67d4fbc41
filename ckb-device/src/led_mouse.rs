//! Mouse lighting encoder

use ckb_transport::protocol::{cmd, Packet, MSG_SIZE};
use tracing::{debug, trace};

use crate::device::Device;
use crate::error::DeviceError;
use crate::lighting::{Lighting, MOUSE_ZONE_RANGE};

/// Header of the zone color packet: write, zone colors, zone count, 1
const COLOR_HEADER: [u8; 4] = [cmd::WRITE, cmd::ZONE_COLORS, 0x04, 0x01];

/// Build the 64-byte zone color packet for a lighting buffer
pub fn color_packet(light: &Lighting) -> Packet {
    let mut buf = [0u8; MSG_SIZE];
    buf[..COLOR_HEADER.len()].copy_from_slice(&COLOR_HEADER);
    for (zone, index) in MOUSE_ZONE_RANGE.enumerate() {
        let off = COLOR_HEADER.len() + zone * 4;
        buf[off] = zone as u8 + 1;
        buf[off + 1] = light.r[index];
        buf[off + 2] = light.g[index];
        buf[off + 3] = light.b[index];
    }
    buf
}

fn enable_packet(on: bool) -> Packet {
    let mut buf = [0u8; MSG_SIZE];
    buf[..5].copy_from_slice(&[cmd::WRITE, cmd::LIGHT_ENABLE, 0x02, 0x00, on as u8]);
    buf
}

/// Send the current mode's zone colors when they differ from the last sent
///
/// The snapshot in `profile.last_light` is only replaced once every packet
/// went out, so a failed update is retried in full next time.
pub fn update_mouse_rgb(dev: &mut Device, force: bool) -> Result<(), DeviceError> {
    if !dev.active {
        return Ok(());
    }
    let last = &dev.profile.last_light;
    let new = &dev.profile.current_mode().light;
    if !force && last.range_eq(new, MOUSE_ZONE_RANGE) {
        trace!("{}: mouse lighting unchanged", dev.identity.serial);
        return Ok(());
    }

    let color = color_packet(new);
    let was_black = last.is_black(MOUSE_ZONE_RANGE);
    let is_black = new.is_black(MOUSE_ZONE_RANGE);

    dev.transport.send(&color)?;
    if is_black {
        dev.transport.send(&enable_packet(false))?;
    } else if was_black || force {
        dev.transport.send(&enable_packet(true))?;
    }

    debug!("{}: mouse lighting updated", dev.identity.serial);
    dev.profile.last_light = dev.profile.current_mode().light.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::RgbColor;
    use ckb_transport::{find_device, RecordingTransport, VENDOR_ID};
    use std::sync::Arc;

    const OFF: [u8; 5] = [0x07, 0x05, 0x02, 0x00, 0x00];
    const ON: [u8; 5] = [0x07, 0x05, 0x02, 0x00, 0x01];

    fn mouse() -> (Device, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new(VENDOR_ID, 0x1B12));
        let known = find_device(VENDOR_ID, 0x1B12).unwrap();
        let mut dev = Device::new(transport.clone(), known);
        dev.active = true;
        (dev, transport)
    }

    fn light_zones(dev: &mut Device, color: RgbColor) {
        for i in MOUSE_ZONE_RANGE {
            dev.profile.current_mode_mut().light.set(i, color);
        }
    }

    #[test]
    fn test_color_packet_layout() {
        let mut light = Lighting::default();
        light.set(MOUSE_ZONE_RANGE.start, RgbColor::new(0x10, 0x20, 0x30));
        light.set(MOUSE_ZONE_RANGE.start + 3, RgbColor::new(1, 2, 3));
        let p = color_packet(&light);
        assert_eq!(&p[..4], &[0x07, 0x22, 0x04, 0x01]);
        assert_eq!(&p[4..8], &[1, 0x10, 0x20, 0x30]);
        assert_eq!(&p[8..12], &[2, 0, 0, 0]);
        assert_eq!(&p[16..20], &[4, 1, 2, 3]);
        assert!(p[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unchanged_sends_nothing() {
        let (mut dev, t) = mouse();
        update_mouse_rgb(&mut dev, false).unwrap();
        assert!(t.sent().is_empty());
    }

    #[test]
    fn test_keys_outside_zones_ignored() {
        let (mut dev, t) = mouse();
        dev.profile.current_mode_mut().light.set(4, RgbColor::WHITE);
        update_mouse_rgb(&mut dev, false).unwrap();
        assert!(t.sent().is_empty());
    }

    #[test]
    fn test_black_to_lit_turns_on() {
        let (mut dev, t) = mouse();
        light_zones(&mut dev, RgbColor::new(255, 0, 0));
        update_mouse_rgb(&mut dev, false).unwrap();
        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0][..4], &COLOR_HEADER);
        assert_eq!(&sent[1][..5], &ON);
        assert_eq!(dev.profile.last_light, dev.profile.current_mode().light);
    }

    #[test]
    fn test_lit_to_black_turns_off() {
        let (mut dev, t) = mouse();
        light_zones(&mut dev, RgbColor::WHITE);
        update_mouse_rgb(&mut dev, false).unwrap();
        t.clear();

        light_zones(&mut dev, RgbColor::BLACK);
        update_mouse_rgb(&mut dev, false).unwrap();
        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[1][..5], &OFF);
    }

    #[test]
    fn test_lit_to_lit_color_only() {
        let (mut dev, t) = mouse();
        light_zones(&mut dev, RgbColor::WHITE);
        update_mouse_rgb(&mut dev, false).unwrap();
        t.clear();

        light_zones(&mut dev, RgbColor::new(0, 0, 255));
        update_mouse_rgb(&mut dev, false).unwrap();
        assert_eq!(t.sent().len(), 1);
    }

    #[test]
    fn test_force_resends_with_on() {
        let (mut dev, t) = mouse();
        light_zones(&mut dev, RgbColor::WHITE);
        update_mouse_rgb(&mut dev, false).unwrap();
        t.clear();

        update_mouse_rgb(&mut dev, true).unwrap();
        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[1][..5], &ON);
    }

    #[test]
    fn test_failure_keeps_snapshot_and_retries() {
        let (mut dev, t) = mouse();
        light_zones(&mut dev, RgbColor::WHITE);
        t.fail_after(1);
        assert!(update_mouse_rgb(&mut dev, false).is_err());
        assert!(dev.profile.last_light.is_black(MOUSE_ZONE_RANGE));

        t.heal();
        t.clear();
        update_mouse_rgb(&mut dev, false).unwrap();
        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[1][..5], &ON);
    }

    #[test]
    fn test_inactive_is_noop() {
        let (mut dev, t) = mouse();
        dev.active = false;
        light_zones(&mut dev, RgbColor::WHITE);
        update_mouse_rgb(&mut dev, true).unwrap();
        assert!(t.sent().is_empty());
    }
}
