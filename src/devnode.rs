//! Device node lifecycle
//!
//! Every slot gets a directory `<base><slot>`. Slot 0 holds the aggregate
//! `connected` listing plus `version` and `pid`; hardware slots hold the
//! `cmd` FIFO, `notify<n>` FIFOs and metadata files.

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use ckb_device::{Device, DeviceIdentity, OUTFIFO_MAX};

use crate::error::NodeError;

/// Default node base path
pub const DEFAULT_DEVPATH: &str = "/dev/input/ckb";
/// Version string published in the root node
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where nodes live and who may use them
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path prefix; slot `n` lives at `<base><n>`
    pub base: PathBuf,
    /// Group granted access to the nodes
    pub gid: Option<u32>,
}

/// Removes a freshly created path on drop unless committed
#[must_use]
pub struct NodeGuard {
    path: PathBuf,
    is_dir: bool,
    committed: bool,
}

impl NodeGuard {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            committed: false,
        }
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the path
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let result = if self.is_dir {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => debug!("Rolled back {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Unable to roll back {}: {}", self.path.display(), e),
        }
    }
}

/// Delete a directory tree; a missing tree counts as success
pub fn rm_recursive(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn mkfifo(path: &Path, mode: u32) -> Result<(), NodeError> {
    let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| NodeError::FifoCreate {
        path: path.to_path_buf(),
        source: io::Error::from(ErrorKind::InvalidInput),
    })?;
    // SAFETY: cpath is a valid NUL-terminated string for the duration of the call
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), mode as libc::mode_t) };
    if rc != 0 {
        return Err(NodeError::FifoCreate {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// One `connected` listing line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub slot: usize,
    pub serial: String,
    pub name: String,
}

impl ListingEntry {
    pub fn new(slot: usize, identity: &DeviceIdentity) -> Self {
        Self {
            slot,
            serial: identity.serial.clone(),
            name: identity.name.clone(),
        }
    }
}

impl NodeConfig {
    pub fn new(base: impl Into<PathBuf>, gid: Option<u32>) -> Self {
        Self {
            base: base.into(),
            gid,
        }
    }

    /// Directory of a slot
    pub fn slot_path(&self, slot: usize) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(slot.to_string());
        PathBuf::from(path)
    }

    fn dir_mode(&self) -> u32 {
        if self.gid.is_some() {
            0o750
        } else {
            0o700
        }
    }

    fn file_mode(&self) -> u32 {
        if self.gid.is_some() {
            0o640
        } else {
            0o600
        }
    }

    fn cmd_mode(&self) -> u32 {
        if self.gid.is_some() {
            0o620
        } else {
            0o600
        }
    }

    fn notify_mode(&self) -> u32 {
        self.file_mode()
    }

    /// Apply permission bits and group ownership
    ///
    /// Failures are logged; the node stays usable by its owner.
    fn restrict(&self, path: &Path, mode: u32) {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            warn!("Unable to set mode {:o} on {}: {}", mode, path.display(), e);
        }
        if let Some(gid) = self.gid {
            if let Err(e) = std::os::unix::fs::chown(path, Some(0), Some(gid)) {
                warn!("Unable to give {} to group {}: {}", path.display(), gid, e);
            }
        }
    }

    /// Write a text file with restricted permissions
    fn write_text(&self, path: &Path, content: &str) -> Result<(), NodeError> {
        let guard = NodeGuard::file(path);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(self.file_mode())
            .open(path)
            .map_err(|e| NodeError::io(path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| NodeError::io(path, e))?;
        self.restrict(path, self.file_mode());
        guard.commit();
        Ok(())
    }

    /// Write a metadata file; failures are logged and the file removed
    fn publish(&self, dir: &Path, name: &str, content: &str) -> bool {
        match self.write_text(&dir.join(name), content) {
            Ok(()) => true,
            Err(e) => {
                warn!("Unable to publish {}: {}", name, e);
                false
            }
        }
    }

    /// Fresh slot directory, with any stale tree removed first
    fn create_dir(&self, slot: usize) -> Result<NodeGuard, NodeError> {
        let path = self.slot_path(slot);
        rm_recursive(&path).map_err(|e| NodeError::io(&path, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| NodeError::io(parent, e))?;
        }
        fs::create_dir(&path).map_err(|e| NodeError::io(&path, e))?;
        let guard = NodeGuard::dir(&path);
        self.restrict(&path, self.dir_mode());
        Ok(guard)
    }

    /// Create the root node with the current listing
    pub fn create_root_nodes(&self, connected: &[ListingEntry]) -> Result<(), NodeError> {
        let guard = self.create_dir(0)?;
        let dir = guard.path().to_path_buf();
        self.write_connected(connected);
        self.publish(&dir, "version", &format!("{}\n", VERSION));
        self.publish(&dir, "pid", &format!("{}\n", std::process::id()));
        guard.commit();
        info!("Root node created at {}", dir.display());
        Ok(())
    }

    /// Create the node tree of a hardware slot
    ///
    /// Only the directory and the command FIFO are fatal; on failure nothing
    /// is left behind.
    pub fn create_device_nodes(&self, slot: usize, dev: &mut Device) -> Result<(), NodeError> {
        // Handles of a previous tree point at nodes about to be unlinked
        dev.cmd = None;
        for channel in dev.notify.iter_mut() {
            *channel = None;
        }
        let guard = self.create_dir(slot)?;
        let dir = guard.path().to_path_buf();

        let cmd_path = dir.join("cmd");
        mkfifo(&cmd_path, self.cmd_mode())?;
        let cmd_guard = NodeGuard::file(&cmd_path);
        self.restrict(&cmd_path, self.cmd_mode());
        let cmd = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&cmd_path)
            .map_err(|e| NodeError::io(&cmd_path, e))?;
        dev.cmd = Some(cmd);
        dev.cmd_generation = dev.cmd_generation.wrapping_add(1);
        cmd_guard.commit();

        if let Err(e) = self.open_notification_channel(slot, dev, 0) {
            warn!("Unable to create notify0: {}", e);
        }

        self.publish(&dir, "model", &format!("{}\n", dev.identity.name));
        self.publish(&dir, "serial", &format!("{}\n", dev.identity.serial));
        self.publish(&dir, "features", &format!("{}\n", dev.features.tokens()));
        self.publish_firmware_info(slot, dev);

        guard.commit();
        info!(
            "Device nodes for {} created at {}",
            dev.identity.serial,
            dir.display()
        );
        Ok(())
    }

    /// Close every handle of a slot and delete its tree
    pub fn remove_device_nodes(&self, slot: usize, dev: Option<&mut Device>) -> Result<(), NodeError> {
        if let Some(dev) = dev {
            dev.cmd = None;
            for n in 0..OUTFIFO_MAX {
                if dev.notify[n].is_some() {
                    if let Err(e) = self.close_notification_channel(slot, dev, n) {
                        warn!("Unable to close notify{}: {}", n, e);
                    }
                }
            }
        }
        let path = self.slot_path(slot);
        match rm_recursive(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Unable to remove {}: {}", path.display(), e);
                Err(NodeError::io(path, e))
            }
        }
    }

    /// Rewrite `<base>0/connected`
    pub fn write_connected(&self, connected: &[ListingEntry]) -> bool {
        let mut listing = String::new();
        for entry in connected {
            listing.push_str(&format!(
                "{} {} {}\n",
                self.slot_path(entry.slot).display(),
                entry.serial,
                entry.name
            ));
        }
        if listing.is_empty() {
            listing.push('\n');
        }
        self.publish(&self.slot_path(0), "connected", &listing)
    }

    /// Rewrite `fwversion` and `pollrate` of a slot
    pub fn publish_firmware_info(&self, slot: usize, dev: &Device) {
        let dir = self.slot_path(slot);
        self.publish(&dir, "fwversion", &format!("{:04x}\n", dev.fwversion));
        let pollrate = dir.join("pollrate");
        if let Err(e) = self.write_text(&pollrate, &format!("{} ms\n", dev.pollrate_ms())) {
            warn!("Unable to write {}: {}", pollrate.display(), e);
        }
    }

    /// Create and open `notify<n>`; already open is success
    pub fn open_notification_channel(
        &self,
        slot: usize,
        dev: &mut Device,
        n: usize,
    ) -> Result<(), NodeError> {
        if n >= OUTFIFO_MAX {
            return Err(NodeError::ChannelOutOfRange(n));
        }
        if dev.notify[n].is_some() {
            return Ok(());
        }
        let path = self.slot_path(slot).join(format!("notify{}", n));
        match fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(NodeError::io(&path, e)),
            _ => {}
        }
        mkfifo(&path, self.notify_mode())?;
        let guard = NodeGuard::file(&path);
        self.restrict(&path, self.notify_mode());
        let fifo: File = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|e| NodeError::io(&path, e))?;
        dev.notify[n] = Some(fifo);
        guard.commit();
        debug!("Opened {}", path.display());
        Ok(())
    }

    /// Close and delete `notify<n>`; a closed channel is success
    pub fn close_notification_channel(
        &self,
        slot: usize,
        dev: &mut Device,
        n: usize,
    ) -> Result<(), NodeError> {
        if n >= OUTFIFO_MAX {
            return Err(NodeError::ChannelOutOfRange(n));
        }
        if dev.notify[n].take().is_none() {
            return Ok(());
        }
        let path = self.slot_path(slot).join(format!("notify{}", n));
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Closed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NodeError::io(path, e)),
        }
    }
}
