#![allow(dead_code)]

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ckb_daemon::NodeConfig;
use ckb_device::Device;
use ckb_transport::{find_device, RecordingTransport, VENDOR_ID};

pub const K70_RGB: u16 = 0x1B13;
pub const K70: u16 = 0x1B09;
pub const M65: u16 = 0x1B12;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Directory under the system temp dir, removed on drop
pub struct ScratchDir(PathBuf);

impl ScratchDir {
    pub fn new(name: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("ckb-test-{}-{}-{}", std::process::id(), name, n));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Node config whose slot directories live inside this scratch dir
    pub fn nodes(&self) -> NodeConfig {
        NodeConfig::new(self.0.join("ckb"), None)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn transport(pid: u16) -> Arc<RecordingTransport> {
    Arc::new(RecordingTransport::new(VENDOR_ID, pid).with_serial(&format!("SER{pid:04X}")))
}

pub fn device(pid: u16) -> (Device, Arc<RecordingTransport>) {
    let t = transport(pid);
    let known = find_device(VENDOR_ID, pid).unwrap();
    (Device::new(t.clone(), known), t)
}

pub fn read_text(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Reader end of a FIFO that never blocks
pub fn open_fifo_reader(path: impl AsRef<Path>) -> File {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .unwrap()
}

/// Everything currently buffered in a FIFO
pub fn drain(fifo: &mut File) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match fifo.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(out).unwrap()
}

/// Poll `cond` until it holds or five seconds pass
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
