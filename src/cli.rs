//! CLI argument parsing for the feederlink simulator

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feederlink")]
#[command(author, version, about = "Feeder liveness and command-acknowledgment coordinator", long_about = None)]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device identifier (overrides config and FEEDER_DEVICE_ID)
    #[arg(short, long)]
    pub device_id: Option<String>,

    /// How long to run the simulated session
    #[arg(long, default_value = "30")]
    pub duration_secs: u64,

    /// Make the simulated device lose every feed_done
    #[arg(long)]
    pub drop_acks: bool,
}
