//! Index constituent lists and the merged ticker universe.
//!
//! Each source is a page holding a table with a designated ticker column. The
//! universe is the set union of every source's column. A source that cannot
//! be fetched or parsed fails the whole build: a screen over a partial
//! universe would look complete while silently missing an index.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{Config, Universe};

/// How a constituent page is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// HTML page; the first table whose header names the column is used
    HtmlTable,
    /// CSV document with a header row
    Csv,
}

/// A remote constituent list and the column holding its tickers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstituentSource {
    pub name: String,
    pub url: String,
    pub column: String,
    pub format: SourceFormat,
}

impl ConstituentSource {
    pub fn html(name: impl Into<String>, url: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            column: column.into(),
            format: SourceFormat::HtmlTable,
        }
    }

    pub fn csv(name: impl Into<String>, url: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            column: column.into(),
            format: SourceFormat::Csv,
        }
    }
}

/// S&P 500 (`Symbol` column) and NASDAQ-100 (`Ticker` column)
pub fn default_sources(config: &Config) -> Vec<ConstituentSource> {
    vec![
        ConstituentSource::html("S&P 500", &config.sp500_url, "Symbol"),
        ConstituentSource::html("NASDAQ-100", &config.nasdaq100_url, "Ticker"),
    ]
}

pub struct UniverseBuilder {
    client: Client,
    sources: Vec<ConstituentSource>,
    max_stocks: Option<usize>,
}

impl UniverseBuilder {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            sources: default_sources(config),
            max_stocks: config.max_stocks,
        })
    }

    pub fn with_sources(mut self, sources: Vec<ConstituentSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn sources(&self) -> &[ConstituentSource] {
        &self.sources
    }

    /// Fetch every source and merge them into one deduplicated universe
    pub async fn build(&self) -> Result<Universe> {
        let mut lists = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            info!("🌐 Fetching {} constituents from {}", source.name, source.url);
            let tickers = self
                .fetch_source(source)
                .await
                .with_context(|| format!("failed to load {} constituents from {}", source.name, source.url))?;
            info!("✅ Parsed {} {} tickers", tickers.len(), source.name);
            lists.push(tickers);
        }

        let universe = merge(lists);
        info!("📋 Universe contains {} unique tickers", universe.len());

        Ok(match self.max_stocks {
            Some(max) => {
                info!("🔢 Limiting to {} stocks", max);
                limit(universe, max)
            }
            None => universe,
        })
    }

    async fn fetch_source(&self, source: &ConstituentSource) -> Result<Vec<String>> {
        let body = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        debug!("Fetched {} bytes for {}", body.len(), source.name);

        match source.format {
            SourceFormat::HtmlTable => extract_column(&body, &source.column),
            SourceFormat::Csv => extract_csv_column(&body, &source.column),
        }
    }
}

/// Set union of several ticker lists
pub fn merge<I>(lists: I) -> Universe
where
    I: IntoIterator<Item = Vec<String>>,
{
    lists.into_iter().flatten().collect()
}

/// Keep the first `max` tickers in sorted order
pub fn limit(universe: Universe, max: usize) -> Universe {
    universe.into_iter().take(max).collect()
}

/// Cell texts of `column` from the first HTML table whose header row names it.
/// Rows and cells of tables nested inside a table are not part of it.
pub fn extract_column(html: &str, column: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;

    for table in document.select(&table_selector) {
        let mut rows = table
            .select(&row_selector)
            .filter(|row| nearest_table(*row).map(|owner| owner.id()) == Some(table.id()));
        let Some(header) = rows.next() else {
            continue;
        };

        let position = cells(header).position(|cell| header_matches(&cell_text(cell), column));

        if let Some(index) = position {
            let tickers = rows
                .filter_map(|row| cells(row).nth(index))
                .map(cell_text)
                .filter(|text| !text.is_empty())
                .collect();
            return Ok(tickers);
        }
    }

    Err(anyhow!("no table with a '{}' column found", column))
}

/// Values of `column` from a CSV document with a header row
pub fn extract_csv_column(text: &str, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let index = reader
        .headers()?
        .iter()
        .position(|header| header.trim() == column)
        .ok_or_else(|| anyhow!("CSV has no '{}' column", column))?;

    let mut tickers = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let Some(value) = record.get(index).map(str::trim).filter(|v| !v.is_empty()) {
            tickers.push(value.to_string());
        }
    }

    Ok(tickers)
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid CSS selector '{}': {:?}", css, e))
}

fn nearest_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "table")
}

/// `th`/`td` children of a row
fn cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|element| matches!(element.value().name(), "th" | "td"))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Header cells may carry footnote markers such as `Symbol[1]`
fn header_matches(text: &str, column: &str) -> bool {
    text == column || text.split('[').next().map(str::trim) == Some(column)
}
