use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use super::{FetchError, FundamentalsProvider};
use crate::models::{Config, FinancialRecord};
use crate::utils::provider_symbol;

/// quoteSummary modules that together carry every field the screener reads
const SUMMARY_MODULES: &str = "financialData,defaultKeyStatistics,summaryDetail";

/// Longest slice of an error body kept in a `FetchError::Http` message
const MAX_ERROR_BODY: usize = 200;

/// Yahoo Finance snapshot client.
///
/// Yahoo hands out a session cookie from its consent domain and expects a
/// matching crumb on every quoteSummary call. Both are obtained lazily on the
/// first request and reused until the API answers 401.
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooClient {
    /// Create a new Yahoo client
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.trim_end_matches('/').to_string(),
            cookie_url: config.yahoo_cookie_url.clone(),
            crumb: Mutex::new(None),
        })
    }

    /// Get the session crumb, establishing the session if necessary
    async fn crumb(&self) -> Result<String, FetchError> {
        let mut guard = self.crumb.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // The consent endpoint answers with an error status but still sets the cookie
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            debug!("Cookie endpoint unreachable: {}", e);
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(http_error(status, &body));
        }

        let crumb = body.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(FetchError::Parse("crumb endpoint returned no crumb".to_string()));
        }

        debug!("Obtained Yahoo session crumb");
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    /// Forget `stale` so the next request re-authenticates. A crumb already
    /// replaced by a concurrent request is kept.
    async fn reset_session(&self, stale: &str) {
        let mut guard = self.crumb.lock().await;
        if guard.as_deref() == Some(stale) {
            *guard = None;
        }
    }

    fn summary_url(&self, ticker: &str, crumb: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url,
            provider_symbol(ticker)
        ))
        .map_err(|e| FetchError::Parse(format!("invalid quote URL for {}: {}", ticker, e)))?;

        url.query_pairs_mut()
            .append_pair("modules", SUMMARY_MODULES)
            .append_pair("crumb", crumb);

        Ok(url)
    }
}

/// quoteSummary response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<BTreeMap<String, Value>>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[async_trait::async_trait]
impl FundamentalsProvider for YahooClient {
    async fn fetch_snapshot(&self, ticker: &str) -> Result<FinancialRecord, FetchError> {
        let crumb = self.crumb().await?;
        let url = self.summary_url(ticker, &crumb)?;

        debug!("Making request to: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await?;
            return Err(match status {
                StatusCode::NOT_FOUND => FetchError::NotFound(ticker.to_string()),
                StatusCode::UNAUTHORIZED => {
                    warn!("Yahoo rejected the session crumb, re-authenticating on next request");
                    self.reset_session(&crumb).await;
                    FetchError::SessionExpired(truncate_body(&body))
                }
                s => http_error(s, &body),
            });
        }

        let payload = response
            .json::<QuoteSummaryResponse>()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    FetchError::Parse(format!("{} for {}", e, ticker))
                } else {
                    FetchError::Network(e)
                }
            })?;

        parse_quote_summary(ticker, payload)
    }
}

/// Flatten a quoteSummary payload into a single field map.
///
/// Formatted values arrive as `{"raw": 0.25, "fmt": "25%"}` and are reduced to
/// their raw value; `{}` marks a field Yahoo does not have and is skipped. When
/// several modules carry the same field the first module (alphabetically) wins.
pub fn parse_quote_summary(
    ticker: &str,
    payload: QuoteSummaryResponse,
) -> Result<FinancialRecord, FetchError> {
    let summary = payload.quote_summary;

    if let Some(error) = summary.error {
        return Err(
            if error.code == "Not Found" || error.description.contains("not found") {
                FetchError::NotFound(ticker.to_string())
            } else {
                FetchError::Parse(format!("{}: {}", error.code, error.description))
            },
        );
    }

    let Some(modules) = summary.result.and_then(|results| results.into_iter().next()) else {
        return Ok(FinancialRecord::default());
    };

    let mut fields = BTreeMap::new();
    for module in modules.values().filter_map(Value::as_object) {
        for (name, value) in module {
            if let Some(value) = flatten_value(value) {
                fields.entry(name.clone()).or_insert(value);
            }
        }
    }

    Ok(FinancialRecord::from_fields(fields))
}

fn flatten_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => map.get("raw").filter(|raw| !raw.is_null()).cloned(),
        other => Some(other.clone()),
    }
}

fn truncate_body(body: &str) -> String {
    body.trim().chars().take(MAX_ERROR_BODY).collect()
}

fn http_error(status: StatusCode, body: &str) -> FetchError {
    FetchError::Http {
        status: status.as_u16(),
        message: truncate_body(body),
    }
}
