use std::path::PathBuf;

use clap::Parser;

/// Run a command, mirror its stdout/stderr and forward every line to a log collector.
#[derive(Parser, Debug)]
#[command(name = "relaylog", version)]
pub struct Args {
    /// Collector host [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Collector port [default: 514]
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum number of buffered lines [default: 10485760]
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Seconds between failed delivery attempts [default: 5]
    #[arg(long)]
    pub retry_interval: Option<u64>,

    /// Per-attempt connect/send timeout in milliseconds [default: 10000]
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Application name placed in each forwarded record [default: my_app]
    #[arg(long)]
    pub app_name: Option<String>,

    /// Config file to use instead of ~/.relaylog/config.toml or ./relaylog.toml
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The command to run and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
