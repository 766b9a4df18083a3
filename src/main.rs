use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use stock_screener::utils::init_tracing;
use stock_screener::{Config, RejectionPolicy, ScreeningPipeline};

/// Screen S&P 500 and NASDAQ-100 constituents on fundamental ratios
#[derive(Parser)]
#[command(name = "stock-screener")]
#[command(version = "0.1.0")]
#[command(about = "Screen S&P 500 and NASDAQ-100 constituents on fundamental ratios")]
#[command(long_about = "
Builds the union of the S&P 500 and NASDAQ-100 constituent lists, fetches a
fundamentals snapshot for every ticker, screens each snapshot against five
ratio thresholds and writes the surviving tickers with their previous close
to <YYYY-MM-DD>_filtered_stocks.txt.

Every option can also be set through the environment (or a .env file); flags
take precedence. Without flags the run uses the all-conditions rejection
policy.
")]
struct Args {
    /// Which condition outcome rejects a ticker
    #[arg(long, value_enum)]
    policy: Option<RejectionPolicy>,

    /// Directory the dated output file is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of snapshot requests in flight
    #[arg(long)]
    workers: Option<usize>,

    /// Only screen the first N tickers of the universe
    #[arg(long)]
    max_stocks: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(policy) = self.policy {
            config.rejection_policy = policy;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(workers) = self.workers {
            config.max_concurrent_requests = workers.max(1);
        }
        if self.max_stocks.is_some() {
            config.max_stocks = self.max_stocks;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("stock_screener=info");

    let args = Args::parse();
    let mut config = Config::from_env()?;
    args.apply(&mut config);

    info!("📋 Configuration loaded (rejection policy: {})", config.rejection_policy);

    let pipeline = ScreeningPipeline::from_config(config)?;
    let summary = pipeline.run().await?;

    info!(
        "📊 {} tickers screened, {} fetched, {} failed, {} written",
        summary.universe_size, summary.fetched, summary.failed, summary.passed
    );

    Ok(())
}
