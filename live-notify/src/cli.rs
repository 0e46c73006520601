use std::path::PathBuf;

use clap::Parser;

use live_notify::config::DEFAULT_CONFIG_PATH;

/// Twitch live notifications for Discord.
#[derive(Parser, Debug)]
#[command(name = "live-notify", version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Send a test notification and exit
    #[arg(long)]
    pub test: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log API request details (secrets redacted)
    #[arg(long)]
    pub debug_api: bool,

    /// Also write daily rolling log files to this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}
