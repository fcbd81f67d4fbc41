// CLI definitions using clap

use clap::Parser;
use std::path::PathBuf;

use ckb_daemon::config::DEFAULT_CONFIG_PATH;
use ckb_daemon::DaemonConfig;

#[derive(Parser)]
#[command(name = "ckb-daemon")]
#[command(author, version, about = "Corsair RGB keyboard and mouse driver daemon")]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Device node path prefix (slot N lives at <DEVPATH>N)
    #[arg(long, value_name = "PATH")]
    pub devpath: Option<PathBuf>,

    /// Group allowed to access the device nodes
    #[arg(long)]
    pub gid: Option<u32>,

    /// Hot-plug scan interval in milliseconds
    #[arg(long = "scan-interval", value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_interval: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Command line flags win over the config file
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(devpath) = &self.devpath {
            config.devpath = devpath.clone();
        }
        if let Some(gid) = self.gid {
            config.gid = Some(gid);
        }
        if let Some(ms) = self.scan_interval {
            config.scan_interval_ms = ms;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}
