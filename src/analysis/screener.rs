// Fundamental-ratio screening
// Five threshold conditions over a snapshot record, combined under an explicit rejection policy

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::models::{Field, FinancialRecord, RejectionPolicy, ScreenedResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
        }
    }
}

/// What a condition concludes when its field is absent from the record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingPolicy {
    /// Compare as if the field had this value
    Assume(f64),
    /// Treat the condition as met
    Holds,
    /// Treat the condition as not met
    Fails,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub comparison: Comparison,
    pub threshold: f64,
    pub when_missing: MissingPolicy,
}

impl Condition {
    pub fn new(field: Field, comparison: Comparison, threshold: f64, when_missing: MissingPolicy) -> Self {
        Self {
            field,
            comparison,
            threshold,
            when_missing,
        }
    }

    pub fn evaluate(&self, record: &FinancialRecord) -> bool {
        match (record.number(self.field), self.when_missing) {
            (Some(value), _) => self.comparison.holds(value, self.threshold),
            (None, MissingPolicy::Assume(value)) => self.comparison.holds(value, self.threshold),
            (None, MissingPolicy::Holds) => true,
            (None, MissingPolicy::Fails) => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparison.symbol(), self.threshold)
    }
}

/// The set of conditions a record is screened against
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub conditions: Vec<Condition>,
}

impl Default for Criteria {
    /// Operating margin above 10%, institutional ownership above 20%,
    /// debt/equity below 1.5, current ratio above 1 and profit margin above 5%.
    /// Missing fields are compared as 0, except debt/equity which assumes 1.
    fn default() -> Self {
        use Comparison::*;
        use MissingPolicy::Assume;

        Self {
            conditions: vec![
                Condition::new(Field::OperatingMargins, GreaterThan, 0.10, Assume(0.0)),
                Condition::new(Field::HeldPercentInstitutions, GreaterThan, 0.20, Assume(0.0)),
                Condition::new(Field::DebtToEquity, LessThan, 1.5, Assume(1.0)),
                Condition::new(Field::CurrentRatio, GreaterThan, 1.0, Assume(0.0)),
                Condition::new(Field::ProfitMargins, GreaterThan, 0.05, Assume(0.0)),
            ],
        }
    }
}

/// Outcome of screening one ticker
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed(f64),
    Rejected { failed: Vec<Field> },
    MissingPrice,
}

/// Output of a full screening pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screening {
    pub results: ScreenedResult,
    pub rejected: usize,
    pub missing_price: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Screener {
    criteria: Criteria,
    policy: RejectionPolicy,
}

impl Screener {
    pub fn new(criteria: Criteria, policy: RejectionPolicy) -> Self {
        Self { criteria, policy }
    }

    pub fn with_policy(policy: RejectionPolicy) -> Self {
        Self::new(Criteria::default(), policy)
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn policy(&self) -> RejectionPolicy {
        self.policy
    }

    /// Whether the policy rejects a record, given the fields whose condition failed
    fn rejects(&self, failed: &[Field]) -> bool {
        match self.policy {
            RejectionPolicy::AllConditions => failed.is_empty(),
            RejectionPolicy::AnyCondition => !failed.is_empty(),
        }
    }

    pub fn evaluate(&self, record: &FinancialRecord) -> Verdict {
        let failed: Vec<Field> = self
            .criteria
            .conditions
            .iter()
            .filter(|condition| !condition.evaluate(record))
            .map(|condition| condition.field)
            .collect();

        if self.rejects(&failed) {
            return Verdict::Rejected { failed };
        }

        match record.number(Field::PreviousClose) {
            Some(price) => Verdict::Passed(price),
            None => Verdict::MissingPrice,
        }
    }

    /// Screen every fetched record, logging why each dropped ticker was dropped
    pub fn screen(&self, records: &BTreeMap<String, FinancialRecord>) -> Screening {
        info!(
            "🔍 Screening {} records (rejection policy: {})",
            records.len(),
            self.policy
        );

        let mut screening = Screening::default();

        for (ticker, record) in records {
            match self.evaluate(record) {
                Verdict::Passed(price) => {
                    debug!("{} passed at {}", ticker, price);
                    screening.results.insert(ticker.clone(), price);
                }
                Verdict::Rejected { failed } => {
                    info!(
                        "Filtered out {} due to not meeting criteria (failed: {})",
                        ticker,
                        describe(&failed)
                    );
                    screening.rejected += 1;
                }
                Verdict::MissingPrice => {
                    warn!("Missing {} for {}, dropping it", Field::PreviousClose, ticker);
                    screening.missing_price += 1;
                }
            }
        }

        info!(
            "🎯 {} passed, {} filtered out, {} without a price",
            screening.results.len(),
            screening.rejected,
            screening.missing_price
        );

        screening
    }
}

fn describe(failed: &[Field]) -> String {
    if failed.is_empty() {
        "none".to_string()
    } else {
        failed.iter().map(Field::as_str).collect::<Vec<_>>().join(", ")
    }
}
