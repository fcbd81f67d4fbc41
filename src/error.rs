//! Daemon error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use ckb_device::OUTFIFO_MAX;

/// Errors from device node management
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Notification channel index outside `0..OUTFIFO_MAX`
    #[error("notification channel {0} out of range (0-{max})", max = OUTFIFO_MAX - 1)]
    ChannelOutOfRange(usize),

    #[error("unable to create FIFO {}: {source}", path.display())]
    FifoCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl NodeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no free device slot")]
    Full,

    #[error("slot 0 is reserved for the root node")]
    RootSlot,

    #[error("no device in slot {0}")]
    NoSuchSlot(usize),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("unable to start device worker: {0}")]
    Worker(#[source] io::Error),
}
