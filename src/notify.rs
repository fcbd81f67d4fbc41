//! Notification channel output

use std::io::{ErrorKind, Write};

use tracing::{debug, warn};

use ckb_device::keymap::position_name;
use ckb_device::{Device, Indicators, OUTFIFO_MAX};

/// Write `line` to one notification channel, or to every open one
///
/// Channels never block the daemon: when a reader falls behind and the FIFO
/// is full the line is dropped.
pub fn notify(dev: &Device, channel: Option<usize>, line: &str) {
    let channels = match channel {
        Some(n) if n < OUTFIFO_MAX => n..n + 1,
        Some(n) => {
            warn!("Notification channel {} out of range", n);
            return;
        }
        None => 0..OUTFIFO_MAX,
    };
    let mut msg = String::with_capacity(line.len() + 1);
    msg.push_str(line);
    msg.push('\n');

    for n in channels {
        let Some(fifo) = dev.notify[n].as_ref() else {
            continue;
        };
        let mut fifo = fifo;
        match fifo.write_all(msg.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("notify{} full, dropped: {}", n, line);
            }
            Err(e) => warn!("Unable to write notify{}: {}", n, e),
        }
    }
}

/// Report a key press or release to every channel subscribed to it
pub fn notify_key(dev: &Device, position: usize, down: bool) {
    let mode = dev.profile.current_mode();
    let mut line = None;
    for n in 0..OUTFIFO_MAX {
        if dev.notify[n].is_none() || !mode.notify[n].get(position) {
            continue;
        }
        let line = line.get_or_insert_with(|| {
            format!("key {}{}", if down { '+' } else { '-' }, position_name(position))
        });
        notify(dev, Some(n), line);
    }
}

/// Report indicator changes to subscribed channels
pub fn notify_indicators(dev: &Device, old: Indicators, new: Indicators) {
    let mode = dev.profile.current_mode();
    let changed = old ^ new;
    for flag in changed.iter() {
        let sign = if new.contains(flag) { '+' } else { '-' };
        let line = format!("i {}{}", sign, flag.name());
        for n in 0..OUTFIFO_MAX {
            if mode.inotify[n].contains(flag) {
                notify(dev, Some(n), &line);
            }
        }
    }
}
