//! Input translation
//!
//! Decoded reports become key notifications, macro playback and injected
//! key events. Injection goes through an [`InputSink`].

use tracing::trace;

use ckb_device::{Device, InputReport, KeyBits, MacroAction};

use crate::notify::notify_key;

/// Destination for synthesized input events
pub trait InputSink: Send + Sync {
    /// Press or release a scancode
    fn key(&self, scan: u16, down: bool);

    /// Relative pointer motion
    fn motion(&self, dx: i16, dy: i16);

    /// End of one batch of events
    fn sync(&self);

    /// Indicator LEDs the host wants lit, when known
    fn host_indicators(&self) -> Option<u8> {
        None
    }
}

/// Sink that only traces events
#[derive(Debug, Default)]
pub struct LogSink;

impl InputSink for LogSink {
    fn key(&self, scan: u16, down: bool) {
        trace!("inject key 0x{:03x} {}", scan, if down { "down" } else { "up" });
    }

    fn motion(&self, dx: i16, dy: i16) {
        trace!("inject motion {} {}", dx, dy);
    }

    fn sync(&self) {}
}

fn play(actions: &[MacroAction], sink: &dyn InputSink) {
    for action in actions {
        match *action {
            MacroAction::Key { scan, down } => sink.key(scan, down),
            MacroAction::Move { dx, dy } => sink.motion(dx, dy),
        }
    }
}

/// Apply one decoded report to a device
pub fn translate(dev: &mut Device, report: &InputReport, sink: &dyn InputSink) {
    dev.input.keys = report.keys;
    dev.input.rel_x = report.rel_x;
    dev.input.rel_y = report.rel_y;
    let keys = dev.input.keys;
    let prev = dev.input.prev_keys;
    let changed: Vec<usize> = keys.changed(&prev).collect();

    for &position in &changed {
        notify_key(dev, position, keys.get(position));
    }

    let mut emitted = false;
    // Keys owned by a held macro are not injected on their own
    let mut suppressed = KeyBits::new();
    let bind = &mut dev.profile.current_mode_mut().bind;
    for key_macro in bind.macros.iter_mut() {
        let held = !key_macro.combo.is_empty() && keys.contains_all(&key_macro.combo);
        if held && !key_macro.triggered {
            key_macro.triggered = true;
            play(&key_macro.actions, sink);
            emitted = true;
        }
        if key_macro.triggered {
            for position in key_macro.combo.iter() {
                suppressed.set(position);
            }
        }
        if !held {
            key_macro.triggered = false;
        }
    }

    for &position in &changed {
        if suppressed.get(position) {
            continue;
        }
        if let Some(scan) = bind.action(position) {
            sink.key(scan, keys.get(position));
            emitted = true;
        }
    }

    if report.rel_x != 0 || report.rel_y != 0 {
        sink.motion(report.rel_x, report.rel_y);
        emitted = true;
    }
    if emitted {
        sink.sync();
    }
    dev.input.prev_keys = keys;
}
