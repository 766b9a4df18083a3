use tracing_subscriber::EnvFilter;

/// Initialise stderr logging. `RUST_LOG` wins over the given default directive.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map an index-list symbol to the form the quote provider expects.
///
/// Share classes are listed as `BRK.B` on index pages but quoted as `BRK-B`.
pub fn provider_symbol(ticker: &str) -> String {
    ticker.trim().replace('.', "-")
}

/// Render a price the way the screen file has always shown it: shortest
/// round-trip digits, integral values keeping one decimal place, and
/// scientific notation (`1e+16`, `1.5e-05`) outside `1e-4 <= |x| < 1e16`.
pub fn format_price(price: f64) -> String {
    if price.is_nan() {
        return "nan".to_string();
    }
    if price.is_infinite() {
        return if price > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    if price != 0.0 {
        let scientific = format!("{:e}", price);
        if let Some((mantissa, exponent)) = scientific.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                if !(-4..16).contains(&exponent) {
                    let sign = if exponent < 0 { '-' } else { '+' };
                    return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
                }
            }
        }
    }

    let fixed = price.to_string();
    if fixed.contains('.') {
        fixed
    } else {
        format!("{}.0", fixed)
    }
}
