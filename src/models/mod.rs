use clap::ValueEnum;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Deduplicated set of ticker symbols produced by the universe stage
pub type Universe = BTreeSet<String>;

/// Surviving tickers mapped to their last close price
pub type ScreenedResult = BTreeMap<String, f64>;

/// Fields of a snapshot record the screener knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    OperatingMargins,
    HeldPercentInstitutions,
    DebtToEquity,
    CurrentRatio,
    ProfitMargins,
    PreviousClose,
}

impl Field {
    /// Provider-side name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::OperatingMargins => "operatingMargins",
            Field::HeldPercentInstitutions => "heldPercentInstitutions",
            Field::DebtToEquity => "debtToEquity",
            Field::CurrentRatio => "currentRatio",
            Field::ProfitMargins => "profitMargins",
            Field::PreviousClose => "previousClose",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of fundamental and market fields for one ticker.
///
/// The record keeps every field the provider returned, keyed by the provider's
/// field name. Typed access goes through [`FinancialRecord::number`], which
/// reports absence as `None` instead of substituting a default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialRecord {
    fields: BTreeMap<String, Value>,
}

impl FinancialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style insert, mostly useful for fixtures
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric value of a known field. Null and non-numeric values read as absent.
    pub fn number(&self, field: Field) -> Option<f64> {
        self.fields.get(field.as_str()).and_then(Value::as_f64)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decides which outcome of the five conditions gets a ticker rejected.
///
/// `AllConditions` rejects tickers for which every condition holds and keeps the
/// rest. `AnyCondition` rejects a ticker as soon as one condition fails, so only
/// tickers meeting every condition are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RejectionPolicy {
    #[default]
    AllConditions,
    AnyCondition,
}

impl RejectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionPolicy::AllConditions => "all-conditions",
            RejectionPolicy::AnyCondition => "any-condition",
        }
    }
}

impl fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-conditions" | "all" => Ok(RejectionPolicy::AllConditions),
            "any-condition" | "any" => Ok(RejectionPolicy::AnyCondition),
            other => Err(anyhow::anyhow!(
                "unknown rejection policy '{}' (expected all-conditions or any-condition)",
                other
            )),
        }
    }
}

pub const DEFAULT_SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";
pub const DEFAULT_NASDAQ100_URL: &str = "https://en.wikipedia.org/wiki/NASDAQ-100";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) stock-screener/0.1";

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub rejection_policy: RejectionPolicy,
    pub max_concurrent_requests: usize,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_secs: u64,
    pub max_stocks: Option<usize>,
    pub sp500_url: String,
    pub nasdaq100_url: String,
    pub yahoo_base_url: String,
    pub yahoo_cookie_url: String,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            rejection_policy: RejectionPolicy::default(),
            max_concurrent_requests: 10,
            request_timeout_secs: 30,
            rate_limit_per_minute: 120,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            breaker_failure_threshold: 5,
            breaker_reset_secs: 30,
            max_stocks: None,
            sp500_url: DEFAULT_SP500_URL.to_string(),
            nasdaq100_url: DEFAULT_NASDAQ100_URL.to_string(),
            yahoo_base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            yahoo_cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Malformed numbers fall back to their defaults; an unknown rejection
    /// policy is an error because silently picking a polarity would change
    /// which tickers end up in the output.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let rejection_policy = match lookup("REJECTION_POLICY") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.rejection_policy,
        };

        Ok(Config {
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            rejection_policy,
            max_concurrent_requests: parse_or(&lookup, "MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_requests)
                .max(1),
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)
                .max(1),
            retry_attempts: parse_or(&lookup, "RETRY_ATTEMPTS", defaults.retry_attempts).max(1),
            retry_base_delay_ms: parse_or(&lookup, "RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            breaker_failure_threshold: parse_or(&lookup, "BREAKER_FAILURE_THRESHOLD", defaults.breaker_failure_threshold)
                .max(1),
            breaker_reset_secs: parse_or(&lookup, "BREAKER_RESET_SECS", defaults.breaker_reset_secs),
            max_stocks: lookup("MAX_STOCKS").and_then(|v| v.trim().parse().ok()),
            sp500_url: lookup("SP500_URL").unwrap_or(defaults.sp500_url),
            nasdaq100_url: lookup("NASDAQ100_URL").unwrap_or(defaults.nasdaq100_url),
            yahoo_base_url: lookup("YAHOO_BASE_URL").unwrap_or(defaults.yahoo_base_url),
            yahoo_cookie_url: lookup("YAHOO_COOKIE_URL").unwrap_or(defaults.yahoo_cookie_url),
            user_agent: lookup("USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
