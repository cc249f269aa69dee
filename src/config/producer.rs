// --- Command-Line Arguments Struct ---
// Kept in the library so tests and the HTTP layer can construct it too.
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Redis connection string (e.g., redis://127.0.0.1:6379)
    #[arg(short, long, default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Name of the queue scraped links are published to
    #[arg(short = 'q', long, default_value = "scraped_items")]
    pub queue_name: String,

    /// Target URL to scrape. Together with --keyword this selects one-shot
    /// CLI mode; omit both to run the HTTP service instead.
    #[arg(long)]
    pub url: Option<String>,

    /// Keyword to tag and score the scraped links with
    #[arg(long)]
    pub keyword: Option<String>,

    /// Retry attempts for fetching the target page
    #[arg(long, default_value_t = 3)]
    pub retry_count: u32,

    /// Port for the HTTP service (scrape trigger, health, metrics)
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the score stage, notified after a successful run
    /// (e.g., http://scorer:8081)
    #[arg(long)]
    pub next_stage_url: Option<String>,
}
