//! Match results reported back to the caller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A candidate name that requires withdrawal before a procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// The candidate name as extracted or typed, not the table's spelling
    pub product_name: String,
    /// Withdrawal period from the matched table row
    pub withdrawal_period: String,
}

impl MatchResult {
    pub fn new(product_name: impl Into<String>, withdrawal_period: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            withdrawal_period: withdrawal_period.into(),
        }
    }
}

/// Collapse results sharing `(product_name, withdrawal_period)`, keeping
/// the first occurrence of each.
pub fn dedupe_results<I>(results: I) -> Vec<MatchResult>
where
    I: IntoIterator<Item = MatchResult>,
{
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert((r.product_name.clone(), r.withdrawal_period.clone())))
        .collect()
}

/// Collapse exact-duplicate names, keeping first-seen order.
pub fn dedupe_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(Into::into)
        .filter(|n| seen.insert(n.clone()))
        .collect()
}
