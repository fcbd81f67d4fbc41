//! ckb-daemon
//!
//! Scans for supported devices, gives each one a node tree and keeps the
//! registry in sync with hot-plug events until interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use ckb_daemon::{DaemonConfig, LogSink, Registry};
use ckb_transport::{find_device, HidDiscovery};

mod cli;
use cli::Cli;

/// Granularity of shutdown checks while waiting between scans
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config);

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("ckb-daemon {} starting", ckb_daemon::devnode::VERSION);
    info!("Device nodes at {}N", config.devpath.display());
    if let Some(gid) = config.gid {
        info!("Node group: {}", gid);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("installing signal handler")?;

    let registry = Registry::new(config.node_config(), Arc::new(LogSink));
    registry
        .create_device_nodes(0)
        .context("creating root node")?;

    let discovery = HidDiscovery::new().context("initializing HID")?;

    info!("Entering main loop. Press Ctrl+C to exit.");
    while running.load(Ordering::SeqCst) {
        scan(&discovery, &registry);

        let deadline = Instant::now() + config.scan_interval();
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(SHUTDOWN_POLL.min(config.scan_interval()));
        }
    }

    info!("Shutting down");
    registry.shutdown();
    Ok(())
}

/// One hot-plug pass: reap lost devices, detach vanished ones, attach new ones
fn scan(discovery: &HidDiscovery, registry: &Arc<Registry>) {
    for slot in registry.reap_lost() {
        debug!("Reaped slot {}", slot);
    }

    let found = match discovery.list_devices() {
        Ok(found) => found,
        Err(e) => {
            warn!("Device scan failed: {}", e);
            return;
        }
    };

    for (slot, location) in registry.locations() {
        if !found.iter().any(|d| d.info.device_path == location) {
            info!("Device in slot {} is gone", slot);
            if let Err(e) = registry.detach(slot) {
                warn!("Detaching slot {}: {}", slot, e);
            }
        }
    }

    for device in &found {
        if registry.find_location(&device.info.device_path).is_some() {
            continue;
        }
        let Some(known) = find_device(device.info.vid, device.info.pid) else {
            continue;
        };
        let transport = match discovery.open_device(device) {
            Ok(t) => t,
            Err(e) => {
                warn!("Unable to open {}: {}", known.model, e);
                continue;
            }
        };
        match registry.attach(transport, known) {
            Ok(slot) => info!("{} connected as slot {}", known.model, slot),
            Err(e) => error!("Unable to attach {}: {}", known.model, e),
        }
    }
}
