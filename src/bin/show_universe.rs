use anyhow::Result;
use tracing::info;

use stock_screener::universe::UniverseBuilder;
use stock_screener::utils::init_tracing;
use stock_screener::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("stock_screener=info");

    info!("🔄 Constituent universe");

    let config = Config::from_env()?;
    let builder = UniverseBuilder::new(&config)?;
    for source in builder.sources() {
        info!("📋 {} ({} column): {}", source.name, source.column, source.url);
    }

    let universe = builder.build().await?;
    for ticker in &universe {
        println!("{}", ticker);
    }

    info!("📊 {} unique tickers", universe.len());
    Ok(())
}
