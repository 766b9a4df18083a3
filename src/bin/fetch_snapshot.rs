use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use stock_screener::analysis::{Screener, Verdict};
use stock_screener::api::{FundamentalsProvider, YahooClient};
use stock_screener::utils::init_tracing;
use stock_screener::{Config, RejectionPolicy};

/// Fetch snapshots for a few tickers and show how the screen treats them
#[derive(Parser)]
#[command(name = "fetch_snapshot")]
#[command(about = "Fetch snapshots for a few tickers and show how the screen treats them")]
struct Args {
    /// Tickers to look up
    #[arg(required = true)]
    tickers: Vec<String>,

    /// Rejection policy used for the verdict
    #[arg(long, value_enum)]
    policy: Option<RejectionPolicy>,

    /// Print every field the provider returned
    #[arg(long)]
    all_fields: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("stock_screener=info");

    let args = Args::parse();
    let config = Config::from_env()?;
    let policy = args.policy.unwrap_or(config.rejection_policy);

    let client = YahooClient::new(&config)?;
    let screener = Screener::with_policy(policy);
    info!("🧪 Fetching {} snapshots (policy: {})", args.tickers.len(), policy);

    let mut failures = 0;
    for ticker in &args.tickers {
        let record = match client.fetch_snapshot(ticker).await {
            Ok(record) => record,
            Err(e) => {
                println!("❌ {}: {}", ticker, e);
                failures += 1;
                continue;
            }
        };

        println!("📊 {} ({} fields)", ticker, record.len());
        for condition in &screener.criteria().conditions {
            let value = record
                .number(condition.field)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "missing".to_string());
            let mark = if condition.evaluate(&record) { "✓" } else { "✗" };
            println!("   {} {} (value: {})", mark, condition, value);
        }

        match screener.evaluate(&record) {
            Verdict::Passed(price) => println!("   → kept at {}", price),
            Verdict::Rejected { .. } => println!("   → filtered out"),
            Verdict::MissingPrice => println!("   → dropped, no previous close"),
        }

        if args.all_fields {
            for (name, value) in record.fields() {
                println!("     {}: {}", name, value);
            }
        }
    }

    if failures == args.tickers.len() {
        return Err(anyhow!("no snapshot could be fetched"));
    }

    Ok(())
}
