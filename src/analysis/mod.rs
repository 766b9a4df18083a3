pub mod screener;

pub use screener::{
    Comparison, Condition, Criteria, MissingPolicy, Screener, Screening, Verdict,
};
