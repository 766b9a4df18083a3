pub mod analysis;
pub mod api;
pub mod circuit_breaker;
pub mod concurrent_fetcher;
pub mod models;
pub mod pipeline;
pub mod universe;
pub mod utils;
pub mod writer;

pub use models::{Config, FinancialRecord, RejectionPolicy};
pub use pipeline::{RunSummary, ScreeningPipeline};
