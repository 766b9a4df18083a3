use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::models::FinancialRecord;

pub mod yahoo_client;
pub use yahoo_client::YahooClient;

/// Errors surfaced by a fundamentals provider for a single ticker
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("no data available for {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),
    #[error("provider session expired: {0}")]
    SessionExpired(String),
}

impl FetchError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_)
            | FetchError::Network(_)
            | FetchError::CircuitOpen(_)
            | FetchError::SessionExpired(_) => true,
            FetchError::Http { status, .. } => *status == 429 || *status >= 500,
            FetchError::NotFound(_) | FetchError::Parse(_) => false,
        }
    }
}

/// Rate limiter shared by every in-flight provider request
pub struct ApiRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst.min(per_minute.get())).unwrap_or(NonZeroU32::MIN);

        Self {
            limiter: RateLimiter::direct(Quota::per_minute(per_minute).allow_burst(burst)),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Source of per-ticker snapshot records
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Fetch the snapshot record for one ticker. An empty record means the
    /// provider knows nothing useful about it.
    async fn fetch_snapshot(&self, ticker: &str) -> Result<FinancialRecord, FetchError>;
}
