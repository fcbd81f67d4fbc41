//! ckb-daemon: user-space driver for Corsair RGB keyboards and mice
//!
//! Devices are exposed as node trees under a base path: a `cmd` FIFO that
//! accepts text commands, `notify<n>` FIFOs carrying events, and metadata
//! files. The [`registry::Registry`] owns every connected device.

pub mod command;
pub mod config;
pub mod devnode;
pub mod error;
pub mod input;
pub mod notify;
pub mod readlines;
pub mod registry;
pub mod worker;

pub use config::DaemonConfig;
pub use devnode::{NodeConfig, NodeGuard};
pub use error::{NodeError, RegistryError};
pub use input::{InputSink, LogSink};
pub use readlines::LineReader;
pub use registry::{Registry, DEV_MAX};
pub use worker::CancelToken;
