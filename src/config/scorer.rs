use std::path::PathBuf;

use clap::Parser;

// Define command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Redis connection string (e.g., redis://127.0.0.1:6379)
    #[arg(short, long, default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Name of the queue to consume scraped links from; scored items go to
    /// its `_processed` companion
    #[arg(short = 'q', long, default_value = "scraped_items")]
    pub queue_name: String,

    /// Items popped per drain cycle
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Seconds to sleep when the queue is empty and nothing was processed yet
    #[arg(long, default_value_t = 5)]
    pub wait_time: u64,

    /// Empty polls tolerated before a run completes with "no work found"
    #[arg(long, default_value_t = 12)]
    pub max_idle_polls: u32,

    /// Path to the scoring configuration YAML file.
    #[arg(short = 'c', long, default_value = "config/scoring_config.yaml")]
    pub scoring_config: PathBuf,

    /// Port for the HTTP service (process trigger, health, metrics)
    #[arg(short, long, default_value_t = 8081)]
    pub port: u16,

    /// Base URL of the persist stage, notified after a productive run
    /// (e.g., http://persister:8082)
    #[arg(long)]
    pub next_stage_url: Option<String>,

    /// Drain the queue once and exit instead of serving HTTP
    #[arg(long)]
    pub run_once: bool,

    /// Validate the scoring configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}
