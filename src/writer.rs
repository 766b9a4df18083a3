use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::models::ScreenedResult;
use crate::utils::format_price;

/// `<YYYY-MM-DD>_filtered_stocks.txt`
pub fn output_filename(date: NaiveDate) -> String {
    format!("{}_filtered_stocks.txt", date.format("%Y-%m-%d"))
}

/// Write one `TICKER: PRICE` line per result, replacing any existing file.
///
/// An empty result still creates the file, with zero lines.
pub fn write_results(results: &ScreenedResult, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for (ticker, price) in results {
        writeln!(writer, "{}: {}", ticker, format_price(*price))
            .with_context(|| format!("failed to write to {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    info!("💾 Saved {} tickers to {}", results.len(), path.display());
    Ok(())
}
