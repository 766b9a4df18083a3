//! Yahoo client against a mocked quoteSummary endpoint

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use stock_screener::analysis::{Screener, Verdict};
use stock_screener::api::{FetchError, FundamentalsProvider, YahooClient};
use stock_screener::circuit_breaker::CircuitBreakerConfig;
use stock_screener::concurrent_fetcher::{ConcurrentFetchConfig, ConcurrentFetcher, FetchStatus};
use stock_screener::models::{Config, Field};
use stock_screener::RejectionPolicy;

const CRUMB: &str = "abc123crumb";

fn client_for(server: &MockServer) -> YahooClient {
    let config = Config {
        yahoo_base_url: server.uri(),
        yahoo_cookie_url: format!("{}/consent", server.uri()),
        request_timeout_secs: 5,
        ..Config::default()
    };
    YahooClient::new(&config).unwrap()
}

async fn mount_crumb(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/test/getcrumb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CRUMB))
        .mount(server)
        .await;
}

fn summary_payload() -> serde_json::Value {
    json!({
        "quoteSummary": {
            "result": [{
                "financialData": {
                    "operatingMargins": {"raw": 0.3012, "fmt": "30.12%"},
                    "profitMargins": {"raw": 0.2531, "fmt": "25.31%"},
                    "currentRatio": {"raw": 1.037, "fmt": "1.04"},
                    "debtToEquity": {"raw": 140.968, "fmt": "140.97%"}
                },
                "defaultKeyStatistics": {
                    "heldPercentInstitutions": {"raw": 0.6152, "fmt": "61.52%"}
                },
                "summaryDetail": {
                    "previousClose": {"raw": 189.84, "fmt": "189.84"},
                    "trailingPE": {}
                }
            }],
            "error": null
        }
    })
}

#[tokio::test]
async fn test_fetch_snapshot_sends_crumb_and_flattens_fields() {
    init_test_logging();
    log_test_step("Fetching a snapshot through a crumb session");

    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .and(query_param("modules", "financialData,defaultKeyStatistics,summaryDetail"))
        .and(query_param("crumb", CRUMB))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server).fetch_snapshot("AAPL").await.unwrap();
    log_test_data("AAPL snapshot", &record);

    assert_eq!(record.number(Field::OperatingMargins), Some(0.3012));
    assert_eq!(record.number(Field::HeldPercentInstitutions), Some(0.6152));
    assert_eq!(record.number(Field::DebtToEquity), Some(140.968));
    assert_eq!(record.number(Field::PreviousClose), Some(189.84));
    assert!(record.get("trailingPE").is_none());
}

#[tokio::test]
async fn test_fetched_snapshot_screens_on_debt_to_equity_percent() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_payload()))
        .mount(&server)
        .await;

    let record = client_for(&server).fetch_snapshot("AAPL").await.unwrap();

    // debtToEquity arrives as a percent, so the leverage condition fails
    let verdict = Screener::with_policy(RejectionPolicy::AllConditions).evaluate(&record);
    assert_eq!(verdict, Verdict::Passed(189.84));
}

#[tokio::test]
async fn test_crumb_is_reused_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/test/getcrumb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CRUMB))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/MSFT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_payload()))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.fetch_snapshot("MSFT").await.unwrap();
    client.fetch_snapshot("MSFT").await.unwrap();
}

#[tokio::test]
async fn test_class_share_ticker_is_requested_with_dash() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/BRK-B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server).fetch_snapshot("BRK.B").await.unwrap();
    assert!(!record.is_empty());
}

#[tokio::test]
async fn test_unknown_ticker_maps_to_not_found() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/ZZZZ"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}
            }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_snapshot("ZZZZ").await.unwrap_err();
    assert_matches!(err, FetchError::NotFound(ticker) if ticker == "ZZZZ");
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    mount_crumb(&server).await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_snapshot("AAPL").await.unwrap_err();
    assert_matches!(err, FetchError::Http { status: 502, .. });
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_refreshes_crumb_on_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/test/getcrumb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CRUMB))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Crumb"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.fetch_snapshot("AAPL").await.unwrap_err();
    assert_matches!(first, FetchError::SessionExpired(message) if message == "Invalid Crumb");
    assert!(client.fetch_snapshot("AAPL").await.is_err());
}

#[tokio::test]
async fn test_expired_session_does_not_drop_ticker() {
    init_test_logging();
    log_test_step("Crumb expires mid-run and the fetcher re-authenticates");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/test/getcrumb"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CRUMB))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Crumb"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_payload()))
        .mount(&server)
        .await;

    let fetcher = ConcurrentFetcher::new(
        Arc::new(client_for(&server)),
        ConcurrentFetchConfig {
            num_workers: 1,
            request_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            rate_limit_per_minute: 60_000,
            breaker: CircuitBreakerConfig::with_name("fundamentals").failure_threshold(1),
            show_progress: false,
        },
    );

    let status = fetcher.fetch_one("AAPL").await;
    log_test_data("Fetch status", &status);

    assert_matches!(
        status,
        FetchStatus::Completed(record) if record.number(Field::PreviousClose) == Some(189.84)
    );
}
