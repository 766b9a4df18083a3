use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::analysis::{Screener, Screening};
use crate::api::{FundamentalsProvider, YahooClient};
use crate::concurrent_fetcher::{ConcurrentFetchConfig, ConcurrentFetcher, FetchResult};
use crate::models::{Config, FinancialRecord, ScreenedResult, Universe};
use crate::universe::{ConstituentSource, UniverseBuilder};
use crate::writer::{output_filename, write_results};

/// Counts and output location of one completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub universe_size: usize,
    pub fetched: usize,
    pub failed: usize,
    pub passed: usize,
    pub rejected: usize,
    pub missing_price: usize,
    pub output_path: PathBuf,
}

/// Universe → fetch → screen → write, with every intermediate value handed
/// explicitly from one stage to the next.
pub struct ScreeningPipeline {
    config: Config,
    universe: UniverseBuilder,
    fetcher: ConcurrentFetcher,
    screener: Screener,
}

impl ScreeningPipeline {
    /// Pipeline backed by the Yahoo Finance provider
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = Arc::new(YahooClient::new(&config)?);
        Self::new(config, provider)
    }

    pub fn new(config: Config, provider: Arc<dyn FundamentalsProvider>) -> Result<Self> {
        let universe = UniverseBuilder::new(&config)?;
        let fetcher = ConcurrentFetcher::new(provider, ConcurrentFetchConfig::from(&config));
        let screener = Screener::with_policy(config.rejection_policy);

        Ok(Self {
            config,
            universe,
            fetcher,
            screener,
        })
    }

    pub fn with_sources(mut self, sources: Vec<ConstituentSource>) -> Self {
        self.universe = self.universe.with_sources(sources);
        self
    }

    pub fn with_fetch_config(mut self, fetch_config: ConcurrentFetchConfig) -> Self {
        self.fetcher = ConcurrentFetcher::new(self.fetcher.provider(), fetch_config);
        self
    }

    pub fn with_screener(mut self, screener: Screener) -> Self {
        self.screener = screener;
        self
    }

    pub async fn build_universe(&self) -> Result<Universe> {
        self.universe.build().await
    }

    pub async fn fetch(&self, universe: &Universe) -> FetchResult {
        self.fetcher.fetch_all(universe).await
    }

    pub fn screen(&self, records: &BTreeMap<String, FinancialRecord>) -> Screening {
        self.screener.screen(records)
    }

    /// Write the results under the configured output directory, named for `date`
    pub fn write(&self, results: &ScreenedResult, date: NaiveDate) -> Result<PathBuf> {
        let path = self.config.output_dir.join(output_filename(date));
        write_results(results, &path)?;
        Ok(path)
    }

    /// Run every stage, naming the output file after today's local date
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_on(Local::now().date_naive()).await
    }

    pub async fn run_on(&self, date: NaiveDate) -> Result<RunSummary> {
        info!("🚀 Starting stock screen for {}", date);

        let universe = self.build_universe().await?;
        let fetched = self.fetch(&universe).await;
        let screening = self.screen(&fetched.records);
        let output_path = self.write(&screening.results, date)?;

        let summary = RunSummary {
            universe_size: universe.len(),
            fetched: fetched.fetched_stocks(),
            failed: fetched.failed_stocks,
            passed: screening.results.len(),
            rejected: screening.rejected,
            missing_price: screening.missing_price,
            output_path,
        };

        info!(
            "✅ Screen complete: {} of {} tickers written to {}",
            summary.passed,
            summary.universe_size,
            summary.output_path.display()
        );

        Ok(summary)
    }
}
