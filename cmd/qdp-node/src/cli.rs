use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "qdp-node")]
#[command(author, version)]
#[command(about = "Sharded, account-partitioned payment-processing node")]
pub struct Args {
    /// Path to the node's TOML config file.
    #[arg(long = "config", value_name = "PATH", default_value = "node.toml")]
    pub config_path: PathBuf,

    /// Overrides the config file's log level.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}
