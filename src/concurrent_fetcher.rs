//! Concurrent snapshot fetching module
//!
//! Fetches one snapshot record per ticker with a bounded number of requests in
//! flight. Every request is paced by a shared rate limiter, bounded by a
//! timeout and guarded by a circuit breaker; transient failures are retried
//! with exponential backoff. A ticker that still fails is logged and left out
//! of the result, it never aborts the run.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{ApiRateLimiter, FetchError, FundamentalsProvider};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::models::{Config, FinancialRecord, Universe};

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for concurrent fetching
#[derive(Debug, Clone)]
pub struct ConcurrentFetchConfig {
    pub num_workers: usize,
    pub request_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub rate_limit_per_minute: u32,
    pub breaker: CircuitBreakerConfig,
    pub show_progress: bool,
}

impl Default for ConcurrentFetchConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ConcurrentFetchConfig {
    fn from(config: &Config) -> Self {
        Self {
            num_workers: config.max_concurrent_requests.max(1),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry_attempts: config.retry_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            rate_limit_per_minute: config.rate_limit_per_minute,
            breaker: CircuitBreakerConfig::with_name("fundamentals")
                .failure_threshold(config.breaker_failure_threshold)
                .reset_timeout(Duration::from_secs(config.breaker_reset_secs)),
            show_progress: true,
        }
    }
}

/// Status of a fetch operation
#[derive(Debug)]
pub enum FetchStatus {
    Completed(FinancialRecord),
    Empty,
    Failed(FetchError),
}

/// Result of concurrent fetching operation
#[derive(Debug, Default)]
pub struct FetchResult {
    pub records: BTreeMap<String, FinancialRecord>,
    pub total_stocks: usize,
    pub empty_stocks: usize,
    pub failed_stocks: usize,
}

impl FetchResult {
    pub fn fetched_stocks(&self) -> usize {
        self.records.len()
    }
}

pub struct ConcurrentFetcher {
    provider: Arc<dyn FundamentalsProvider>,
    config: ConcurrentFetchConfig,
    rate_limiter: ApiRateLimiter,
    breaker: CircuitBreaker,
}

impl ConcurrentFetcher {
    pub fn new(provider: Arc<dyn FundamentalsProvider>, config: ConcurrentFetchConfig) -> Self {
        let rate_limiter = ApiRateLimiter::new(config.rate_limit_per_minute, config.num_workers as u32);
        let breaker = CircuitBreaker::new(config.breaker.clone());

        Self {
            provider,
            config,
            rate_limiter,
            breaker,
        }
    }

    pub fn provider(&self) -> Arc<dyn FundamentalsProvider> {
        Arc::clone(&self.provider)
    }

    /// Fetch a snapshot for every ticker in the universe
    pub async fn fetch_all(&self, universe: &Universe) -> FetchResult {
        let total_stocks = universe.len();
        info!(
            "🚀 Fetching {} snapshots with {} workers",
            total_stocks, self.config.num_workers
        );

        let progress = self.progress_bar(total_stocks as u64);
        let mut result = FetchResult {
            total_stocks,
            ..Default::default()
        };

        let mut outcomes = stream::iter(universe.iter().cloned())
            .map(|ticker| async move {
                let status = self.fetch_one(&ticker).await;
                (ticker, status)
            })
            .buffer_unordered(self.config.num_workers);

        while let Some((ticker, status)) = outcomes.next().await {
            match status {
                FetchStatus::Completed(record) => {
                    debug!("✅ {}: {} fields", ticker, record.len());
                    result.records.insert(ticker, record);
                }
                FetchStatus::Empty => result.empty_stocks += 1,
                FetchStatus::Failed(e) => {
                    warn!("❌ Failed to fetch data for {}: {}", ticker, e);
                    result.failed_stocks += 1;
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        info!(
            "📊 Fetch complete: {} records, {} empty, {} failed",
            result.fetched_stocks(),
            result.empty_stocks,
            result.failed_stocks
        );

        result
    }

    /// Fetch one ticker, classifying the outcome
    pub async fn fetch_one(&self, ticker: &str) -> FetchStatus {
        match self.fetch_with_retry(ticker).await {
            Ok(record) if record.is_empty() => FetchStatus::Empty,
            Ok(record) => FetchStatus::Completed(record),
            Err(e) => FetchStatus::Failed(e),
        }
    }

    async fn fetch_with_retry(&self, ticker: &str) -> Result<FinancialRecord, FetchError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.attempt(ticker).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && attempts < self.config.retry_attempts => {
                    let delay = self.backoff_delay(attempts);
                    warn!(
                        "Attempt {} failed for {}: {}. Retrying in {:?}...",
                        attempts, ticker, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, ticker: &str) -> Result<FinancialRecord, FetchError> {
        if let Some(wait) = self.breaker.retry_after() {
            debug!("Circuit open, {} waits {:?}", ticker, wait);
            tokio::time::sleep(wait).await;
        }
        if !self.breaker.try_acquire() {
            return Err(FetchError::CircuitOpen(self.breaker.name().to_string()));
        }

        self.rate_limiter.wait().await;

        let result = match tokio::time::timeout(
            self.config.request_timeout,
            self.provider.fetch_snapshot(ticker),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.request_timeout)),
        };

        // Only provider-health failures count against the circuit
        match &result {
            Err(FetchError::SessionExpired(_)) => self.breaker.release(),
            Err(e) if e.is_transient() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }

        result
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.config
            .retry_base_delay
            .saturating_mul(factor)
            .min(MAX_BACKOFF)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Fetching data");
        pb
    }
}
