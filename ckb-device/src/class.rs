//! Device classes and the commands they understand

use std::time::Duration;

use ckb_transport::protocol::{cmd, packet};
use ckb_transport::{DeviceKind, KnownDevice};
use tracing::{debug, info};

use crate::device::Device;
use crate::error::DeviceError;
use crate::led_mouse;
use crate::profile::Indicators;

/// Operations every device class provides
pub trait DeviceCommand {
    /// Push the current mode's lighting to the device
    fn update_rgb(&self, dev: &mut Device, force: bool) -> Result<(), DeviceError>;

    /// Recompute indicator LEDs; returns `(old, new)` when they were written
    fn update_indicators(
        &self,
        dev: &mut Device,
        force: bool,
    ) -> Result<Option<(Indicators, Indicators)>, DeviceError>;

    /// Switch between software (`true`) and hardware control
    fn set_active(&self, dev: &mut Device, on: bool) -> Result<(), DeviceError>;

    /// Read firmware version and poll interval
    fn query_firmware(&self, dev: &mut Device) -> Result<(), DeviceError>;
}

/// Closed set of device classes, chosen once at detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    KeyboardRgb,
    KeyboardNonRgb,
    Mouse,
}

impl DeviceClass {
    pub fn from_known(known: &KnownDevice) -> Self {
        match (known.kind, known.rgb) {
            (DeviceKind::Mouse, _) => Self::Mouse,
            (DeviceKind::Keyboard, true) => Self::KeyboardRgb,
            (DeviceKind::Keyboard, false) => Self::KeyboardNonRgb,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Mouse => DeviceKind::Mouse,
            Self::KeyboardRgb | Self::KeyboardNonRgb => DeviceKind::Keyboard,
        }
    }
}

impl DeviceCommand for DeviceClass {
    fn update_rgb(&self, dev: &mut Device, force: bool) -> Result<(), DeviceError> {
        match self {
            Self::Mouse => led_mouse::update_mouse_rgb(dev, force),
            Self::KeyboardNonRgb => Ok(()),
            Self::KeyboardRgb => {
                if !dev.active {
                    return Ok(());
                }
                if !force && dev.profile.last_light == dev.profile.current_mode().light {
                    return Ok(());
                }
                Err(DeviceError::Unsupported(
                    "keyboard RGB lighting".to_string(),
                ))
            }
        }
    }

    fn update_indicators(
        &self,
        dev: &mut Device,
        force: bool,
    ) -> Result<Option<(Indicators, Indicators)>, DeviceError> {
        if *self == Self::Mouse {
            return Ok(None);
        }
        let mode = dev.profile.current_mode();
        let effective = (dev.os_ileds & !mode.ioff) | mode.ion;
        if effective == dev.ileds && !force {
            return Ok(None);
        }
        dev.transport.set_leds(effective.bits())?;
        let old = dev.ileds;
        dev.ileds = effective;
        debug!("Indicators {:?} -> {:?}", old, effective);
        Ok(Some((old, effective)))
    }

    fn set_active(&self, dev: &mut Device, on: bool) -> Result<(), DeviceError> {
        let mode = if on {
            cmd::MODE_SOFTWARE
        } else {
            cmd::MODE_HARDWARE
        };
        let buf = packet(&[cmd::WRITE, cmd::CTRL_MODE, mode])?;
        dev.transport.send(&buf)?;
        dev.active = on;
        debug!(
            "{} now under {} control",
            dev.identity.serial,
            if on { "software" } else { "hardware" }
        );
        Ok(())
    }

    fn query_firmware(&self, dev: &mut Device) -> Result<(), DeviceError> {
        let buf = packet(&[cmd::READ, cmd::IDENT])?;
        let resp = dev.transport.query(&buf)?;
        if resp[0] != cmd::READ {
            return Err(DeviceError::UnexpectedResponse(format!(
                "firmware query echoed 0x{:02x}",
                resp[0]
            )));
        }
        dev.fwversion = u16::from_le_bytes([resp[8], resp[9]]);
        dev.pollrate = match resp[10] {
            0 => None,
            ms => Some(Duration::from_millis(ms as u64)),
        };
        info!(
            "{}: firmware {:04x}, poll interval {} ms",
            dev.identity.serial,
            dev.fwversion,
            dev.pollrate_ms()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_transport::{find_device, Packet, RecordingTransport, MSG_SIZE, VENDOR_ID};
    use std::sync::Arc;

    fn device(pid: u16) -> (Device, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new(VENDOR_ID, pid));
        let known = find_device(VENDOR_ID, pid).unwrap();
        (Device::new(transport.clone(), known), transport)
    }

    #[test]
    fn test_class_from_table() {
        let k70 = find_device(VENDOR_ID, 0x1B13).unwrap();
        let k70n = find_device(VENDOR_ID, 0x1B09).unwrap();
        let m65 = find_device(VENDOR_ID, 0x1B12).unwrap();
        assert_eq!(DeviceClass::from_known(k70), DeviceClass::KeyboardRgb);
        assert_eq!(DeviceClass::from_known(k70n), DeviceClass::KeyboardNonRgb);
        assert_eq!(DeviceClass::from_known(m65), DeviceClass::Mouse);
    }

    #[test]
    fn test_set_active_packets() {
        let (mut dev, t) = device(0x1B12);
        let class = dev.class;
        class.set_active(&mut dev, true).unwrap();
        assert!(dev.active);
        class.set_active(&mut dev, false).unwrap();
        assert!(!dev.active);
        let sent = t.sent();
        assert_eq!(&sent[0][..3], &[0x07, 0x04, 0x02]);
        assert_eq!(&sent[1][..3], &[0x07, 0x04, 0x01]);
    }

    #[test]
    fn test_set_active_failure_keeps_state() {
        let (mut dev, t) = device(0x1B12);
        t.fail_after(0);
        let class = dev.class;
        assert!(class.set_active(&mut dev, true).is_err());
        assert!(!dev.active);
    }

    #[test]
    fn test_query_firmware() {
        let (mut dev, t) = device(0x1B13);
        let mut resp: Packet = [0; MSG_SIZE];
        resp[0] = 0x0E;
        resp[1] = 0x01;
        resp[8] = 0x05;
        resp[9] = 0x01;
        resp[10] = 1;
        t.push_response(resp);
        let class = dev.class;
        class.query_firmware(&mut dev).unwrap();
        assert_eq!(dev.fwversion, 0x0105);
        assert_eq!(dev.pollrate_ms(), 1);
        assert_eq!(&t.sent()[0][..2], &[0x0E, 0x01]);
    }

    #[test]
    fn test_query_firmware_bad_echo() {
        let (mut dev, t) = device(0x1B13);
        t.push_response([0xFF; MSG_SIZE]);
        let class = dev.class;
        assert!(matches!(
            class.query_firmware(&mut dev),
            Err(DeviceError::UnexpectedResponse(_))
        ));
        assert_eq!(dev.fwversion, 0);
    }

    #[test]
    fn test_indicator_overrides() {
        let (mut dev, t) = device(0x1B09);
        dev.os_ileds = Indicators::NUM | Indicators::CAPS;
        dev.profile.current_mode_mut().ioff = Indicators::CAPS;
        dev.profile.current_mode_mut().ion = Indicators::SCROLL;
        let class = dev.class;
        let change = class.update_indicators(&mut dev, false).unwrap();
        assert_eq!(
            change,
            Some((Indicators::empty(), Indicators::NUM | Indicators::SCROLL))
        );
        assert_eq!(t.leds(), vec![0x05]);

        // unchanged: nothing written
        assert_eq!(class.update_indicators(&mut dev, false).unwrap(), None);
        assert_eq!(t.leds().len(), 1);
    }

    #[test]
    fn test_mouse_has_no_indicators() {
        let (mut dev, t) = device(0x1B12);
        dev.os_ileds = Indicators::CAPS;
        let class = dev.class;
        assert_eq!(class.update_indicators(&mut dev, true).unwrap(), None);
        assert!(t.leds().is_empty());
    }

    #[test]
    fn test_keyboard_rgb_unsupported_only_on_change() {
        let (mut dev, t) = device(0x1B13);
        dev.active = true;
        let class = dev.class;
        class.update_rgb(&mut dev, false).unwrap();
        dev.profile
            .current_mode_mut()
            .light
            .set(4, crate::lighting::RgbColor::WHITE);
        assert!(matches!(
            class.update_rgb(&mut dev, false),
            Err(DeviceError::Unsupported(_))
        ));
        assert!(t.sent().is_empty());
    }
}
