//! Universe construction against mocked constituent pages

use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fixtures::constituent_page;
use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use stock_screener::models::{Config, Universe};
use stock_screener::universe::{ConstituentSource, UniverseBuilder};

async fn serve_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn universe(tickers: &[&str]) -> Universe {
    tickers.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_universe_is_union_of_both_indexes() {
    init_test_logging();
    log_test_step("Merging overlapping constituent lists");

    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Symbol", &["AAPL", "MSFT"])).await;
    serve_page(&server, "/ndx", constituent_page("Ticker", &["MSFT", "NVDA"])).await;

    let builder = UniverseBuilder::new(&Config::default())
        .unwrap()
        .with_sources(vec![
            ConstituentSource::html("S&P 500", format!("{}/sp500", server.uri()), "Symbol"),
            ConstituentSource::html("NASDAQ-100", format!("{}/ndx", server.uri()), "Ticker"),
        ]);

    let result = builder.build().await.unwrap();
    log_test_data("Universe", &result);

    assert_eq!(result, universe(&["AAPL", "MSFT", "NVDA"]));
}

#[tokio::test]
async fn test_ticker_symbols_are_kept_verbatim() {
    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Symbol", &["BRK.B", "BF.B"])).await;

    let builder = UniverseBuilder::new(&Config::default())
        .unwrap()
        .with_sources(vec![ConstituentSource::html(
            "S&P 500",
            format!("{}/sp500", server.uri()),
            "Symbol",
        )]);

    assert_eq!(builder.build().await.unwrap(), universe(&["BF.B", "BRK.B"]));
}

#[tokio::test]
async fn test_unavailable_source_fails_the_build() {
    init_test_logging();

    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Symbol", &["AAPL"])).await;
    Mock::given(method("GET"))
        .and(path("/ndx"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let builder = UniverseBuilder::new(&Config::default())
        .unwrap()
        .with_sources(vec![
            ConstituentSource::html("S&P 500", format!("{}/sp500", server.uri()), "Symbol"),
            ConstituentSource::html("NASDAQ-100", format!("{}/ndx", server.uri()), "Ticker"),
        ]);

    let err = builder.build().await.unwrap_err();
    assert!(format!("{:#}", err).contains("NASDAQ-100"));
}

#[tokio::test]
async fn test_page_without_expected_column_fails_the_build() {
    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Company", &["AAPL"])).await;

    let builder = UniverseBuilder::new(&Config::default())
        .unwrap()
        .with_sources(vec![ConstituentSource::html(
            "S&P 500",
            format!("{}/sp500", server.uri()),
            "Symbol",
        )]);

    assert!(builder.build().await.is_err());
}

#[tokio::test]
async fn test_csv_source_merges_with_html_source() {
    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Symbol", &["AAPL", "KO"])).await;
    serve_page(
        &server,
        "/ndx.csv",
        "Ticker,Company\nAAPL,Apple Inc.\nAMZN,Amazon.com Inc.\n".to_string(),
    )
    .await;

    let builder = UniverseBuilder::new(&Config::default())
        .unwrap()
        .with_sources(vec![
            ConstituentSource::html("S&P 500", format!("{}/sp500", server.uri()), "Symbol"),
            ConstituentSource::csv("NASDAQ-100", format!("{}/ndx.csv", server.uri()), "Ticker"),
        ]);

    assert_eq!(builder.build().await.unwrap(), universe(&["AAPL", "AMZN", "KO"]));
}

#[tokio::test]
async fn test_max_stocks_limits_universe() {
    let server = MockServer::start().await;
    serve_page(&server, "/sp500", constituent_page("Symbol", &["MSFT", "AAPL", "KO"])).await;

    let config = Config {
        max_stocks: Some(2),
        ..Config::default()
    };
    let builder = UniverseBuilder::new(&config)
        .unwrap()
        .with_sources(vec![ConstituentSource::html(
            "S&P 500",
            format!("{}/sp500", server.uri()),
            "Symbol",
        )]);

    assert_eq!(builder.build().await.unwrap(), universe(&["AAPL", "KO"]));
}
