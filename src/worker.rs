//! Per-device worker threads
//!
//! Each device runs an input thread (reads reports, translates them) and a
//! command thread (firmware query, then the command FIFO). Both stop when
//! their [`CancelToken`] is set and flag the slot as lost on disconnect.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use ckb_device::{decode_report, Device, DeviceCommand, DeviceError, Indicators};
use ckb_transport::BoxedTransport;

use crate::command::{run_line, CommandOutcome};
use crate::input::{translate, InputSink};
use crate::notify::notify_indicators;
use crate::readlines::LineReader;
use crate::registry::{Registry, SharedDevice};

/// Timeout for one input read
const INPUT_POLL_MS: i32 = 50;
/// Sleep between command FIFO polls
const COMMAND_POLL: Duration = Duration::from_millis(10);
/// Pause after a failed input read
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Cooperative stop flag shared with worker threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a worker thread needs
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub registry: Arc<Registry>,
    pub slot: usize,
    pub device: SharedDevice,
    pub transport: BoxedTransport,
    pub cancel: CancelToken,
    pub lost: Arc<AtomicBool>,
    pub sink: Arc<dyn InputSink>,
}

impl WorkerContext {
    fn mark_lost(&self) {
        info!("Device in slot {} disconnected", self.slot);
        self.lost.store(true, Ordering::SeqCst);
    }

    /// Log a device error; false when the device is gone
    fn check(&self, what: &str, result: Result<(), DeviceError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) if e.is_disconnect() => {
                self.mark_lost();
                false
            }
            Err(DeviceError::Unsupported(what_failed)) => {
                debug!("slot {}: {} not supported", self.slot, what_failed);
                true
            }
            Err(e) => {
                warn!("slot {}: {} failed: {}", self.slot, what, e);
                true
            }
        }
    }
}

/// Recompute indicators and tell subscribers what changed
fn apply_indicators(dev: &mut Device, force: bool) -> Result<(), DeviceError> {
    let class = dev.class;
    if let Some((old, new)) = class.update_indicators(dev, force)? {
        notify_indicators(dev, old, new);
    }
    Ok(())
}

fn apply_outcome(ctx: &WorkerContext, outcome: CommandOutcome) -> bool {
    let mut dev = ctx.device.lock();
    let class = dev.class;
    if (outcome.light || outcome.refresh)
        && !ctx.check("lighting update", class.update_rgb(&mut dev, outcome.refresh))
    {
        return false;
    }
    if outcome.indicators && !ctx.check("indicator update", apply_indicators(&mut dev, false)) {
        return false;
    }
    true
}

fn input_loop(ctx: WorkerContext) {
    let kind = ctx.device.lock().kind();
    debug!("slot {}: input worker started", ctx.slot);

    while !ctx.cancel.is_cancelled() {
        match ctx.transport.read_input(INPUT_POLL_MS) {
            Ok(Some(raw)) => {
                if let Some(report) = decode_report(kind, &raw) {
                    let mut dev = ctx.device.lock();
                    translate(&mut dev, &report, ctx.sink.as_ref());
                }
            }
            Ok(None) => {}
            Err(e) if e.is_disconnect() => {
                ctx.mark_lost();
                break;
            }
            Err(e) => {
                debug!("slot {}: input read failed: {}", ctx.slot, e);
                thread::sleep(ERROR_BACKOFF);
            }
        }

        if let Some(leds) = ctx.sink.host_indicators() {
            let requested = Indicators::from_bits_truncate(leds);
            let mut dev = ctx.device.lock();
            if dev.os_ileds != requested {
                dev.os_ileds = requested;
                if !ctx.check("indicator update", apply_indicators(&mut dev, false)) {
                    break;
                }
            }
        }
    }
    debug!("slot {}: input worker stopped", ctx.slot);
}

/// Firmware query and switch to software control
fn start_device(ctx: &WorkerContext) -> bool {
    {
        let mut dev = ctx.device.lock();
        let class = dev.class;
        if !ctx.check("firmware query", class.query_firmware(&mut dev)) {
            return false;
        }
    }
    let slot = ctx.slot;
    if ctx
        .registry
        .with_nodes(slot, &ctx.device, |nodes, dev| nodes.publish_firmware_info(slot, dev))
        .is_err()
    {
        return false;
    }

    let mut dev = ctx.device.lock();
    let class = dev.class;
    ctx.check("activation", class.set_active(&mut dev, true))
        && ctx.check("lighting update", class.update_rgb(&mut dev, true))
        && ctx.check("indicator update", apply_indicators(&mut dev, true))
}

/// Read pending commands from the device's current FIFO
///
/// The FIFO is replaced when the slot's nodes are re-created; buffered
/// data from the old one is dropped.
fn poll_commands(ctx: &WorkerContext, reader: &mut LineReader, generation: &mut u64) -> Option<String> {
    let dev = ctx.device.lock();
    let mut cmd = dev.cmd.as_ref()?;
    if dev.cmd_generation != *generation {
        if reader.pending() > 0 {
            debug!("slot {}: command FIFO replaced, dropping partial line", ctx.slot);
        }
        *reader = LineReader::new();
        *generation = dev.cmd_generation;
    }
    reader.read_lines(&mut cmd)
}

fn command_loop(ctx: WorkerContext) {
    debug!("slot {}: command worker started", ctx.slot);
    if !start_device(&ctx) {
        return;
    }

    let mut reader = LineReader::new();
    let mut generation = ctx.device.lock().cmd_generation;
    while !ctx.cancel.is_cancelled() {
        let Some(block) = poll_commands(&ctx, &mut reader, &mut generation) else {
            thread::sleep(COMMAND_POLL);
            continue;
        };
        for line in block.lines().filter(|l| !l.trim().is_empty()) {
            let slot = ctx.slot;
            let outcome = match ctx
                .registry
                .with_nodes(slot, &ctx.device, |nodes, dev| run_line(nodes, slot, dev, line))
            {
                Ok(outcome) => outcome,
                Err(_) => return,
            };
            if !apply_outcome(&ctx, outcome) {
                return;
            }
        }
    }
    debug!("slot {}: command worker stopped", ctx.slot);
}

/// Start both worker threads of a device
pub(crate) fn spawn_workers(ctx: WorkerContext) -> io::Result<Vec<JoinHandle<()>>> {
    let input_ctx = ctx.clone();
    let input = thread::Builder::new()
        .name(format!("ckb{}-input", ctx.slot))
        .spawn(move || input_loop(input_ctx))?;
    let command = thread::Builder::new()
        .name(format!("ckb{}-cmd", ctx.slot));
    let cancel = ctx.cancel.clone();
    match command.spawn(move || command_loop(ctx)) {
        Ok(command) => Ok(vec![input, command]),
        Err(e) => {
            cancel.cancel();
            let _ = input.join();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
