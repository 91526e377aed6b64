//! Match engine: candidate name → reference record.
//!
//! A record matches when the candidate key and either of the record's keys
//! contain one another. This catches OCR truncation and padding in both
//! directions, at the price of false positives on very short names.

use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::debug;

use super::normalize;
use crate::models::{dedupe_results, DrugRecord, MatchResult};
use crate::table::{ReferenceTable, TableEntry};

/// How to choose between several matching records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First matching record in table order
    #[default]
    FirstInTable,
    /// Matching record whose key is most similar to the candidate;
    /// equal scores fall back to table order
    Closest,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first_in_table" => Ok(TieBreak::FirstInTable),
            "closest" => Ok(TieBreak::Closest),
            other => Err(format!("unknown tie-break policy: {other}")),
        }
    }
}

/// Matches candidate names against a reference table.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    table: &'a ReferenceTable,
    tie_break: TieBreak,
}

impl<'a> Matcher<'a> {
    /// Create a matcher with the default positional tie-break.
    pub fn new(table: &'a ReferenceTable) -> Self {
        Self {
            table,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Find the record a candidate denotes, whether or not it is restricted.
    pub fn find_match(&self, candidate: &str) -> Option<&'a DrugRecord> {
        let key = normalize(candidate);
        if key.is_empty() {
            return None;
        }

        let entries = self.table.entries();
        let entry = match self.tie_break {
            TieBreak::FirstInTable => entries.iter().find(|e| entry_matches(e, &key)),
            TieBreak::Closest => closest_entry(entries, &key),
        }?;

        debug!(
            candidate,
            product = %entry.record.product_name,
            restricted = entry.record.is_restricted(),
            "Matched reference record"
        );
        Some(&entry.record)
    }

    /// Washout requirement for a candidate, if its matched record has one.
    ///
    /// The reported name is the candidate as given, not the table's spelling.
    pub fn washout_for(&self, candidate: &str) -> Option<MatchResult> {
        let record = self.find_match(candidate)?;
        let period = record.withdrawal_period.as_ref()?;
        Some(MatchResult::new(candidate, period.clone()))
    }

    /// Keep only candidates that hit at least one table record.
    ///
    /// Restriction is ignored here: this only answers "is this plausibly a
    /// drug name", to drop names the extractor invented.
    pub fn validate_against_table<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| self.is_known(c))
            .map(str::to_string)
            .collect()
    }

    /// Whether a candidate hits any record at all.
    pub fn is_known(&self, candidate: &str) -> bool {
        let key = normalize(candidate);
        !key.is_empty() && self.table.entries().iter().any(|e| entry_matches(e, &key))
    }

    /// Washout results for a list of names, deduplicated on
    /// `(product_name, withdrawal_period)` in input order.
    pub fn match_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<MatchResult> {
        dedupe_results(names.iter().filter_map(|n| self.washout_for(n.as_ref())))
    }
}

fn keys_overlap(candidate_key: &str, record_key: &str) -> bool {
    !record_key.is_empty()
        && (candidate_key.contains(record_key) || record_key.contains(candidate_key))
}

fn entry_matches(entry: &TableEntry, key: &str) -> bool {
    keys_overlap(key, &entry.product_key) || keys_overlap(key, &entry.generic_key)
}

/// Similarity of the best overlapping key of an entry, if any overlaps.
fn entry_similarity(entry: &TableEntry, key: &str) -> Option<f64> {
    [&entry.product_key, &entry.generic_key]
        .into_iter()
        .filter(|k| keys_overlap(key, k))
        .map(|k| similarity(key, k))
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

fn closest_entry<'t>(entries: &'t [TableEntry], key: &str) -> Option<&'t TableEntry> {
    let mut best: Option<(&TableEntry, f64)> = None;
    for entry in entries {
        if let Some(score) = entry_similarity(entry, key) {
            // Strictly greater keeps the earlier entry on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((entry, score));
            }
        }
    }
    best.map(|(entry, _)| entry)
}

/// Blend of Jaro-Winkler (prefix-friendly) and normalized Levenshtein.
fn similarity(a: &str, b: &str) -> f64 {
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ReferenceTable {
        ReferenceTable::from_records(vec![
            DrugRecord::new("アクトス", "ピオグリタゾン", Some("7日間")),
            DrugRecord::new("バファリン「A」", "アスピリン", None),
            DrugRecord::new("バイアスピリン", "アスピリン", Some("7日間")),
            DrugRecord::new("プラビックス", "クロピドグレル", Some("14日間")),
            DrugRecord::new("", "", Some("1日")),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_product_name() {
        let table = table();
        let matcher = Matcher::new(&table);

        assert_eq!(
            matcher.washout_for("アクトス"),
            Some(MatchResult::new("アクトス", "7日間"))
        );
    }

    #[test]
    fn test_generic_name_match() {
        let table = table();
        let matcher = Matcher::new(&table);

        let record = matcher.find_match("クロピドグレル").unwrap();
        assert_eq!(record.product_name, "プラビックス");
    }

    #[test]
    fn test_candidate_contains_record_key() {
        let table = table();
        let matcher = Matcher::new(&table);

        // Dosage suffix survives normalization but the product key is inside it
        assert_eq!(
            matcher.washout_for("アクトス錠15mg"),
            Some(MatchResult::new("アクトス錠15mg", "7日間"))
        );
    }

    #[test]
    fn test_record_key_contains_candidate() {
        let table = table();
        let matcher = Matcher::new(&table);

        // Truncated OCR output
        let record = matcher.find_match("プラビッ").unwrap();
        assert_eq!(record.product_name, "プラビックス");
    }

    #[test]
    fn test_first_match_in_table_order() {
        let table = table();
        let matcher = Matcher::new(&table);

        // Generic "アスピリン" is shared; the unrestricted row comes first
        let record = matcher.find_match("アスピリン").unwrap();
        assert_eq!(record.product_name, "バファリン「A」");
        assert_eq!(matcher.washout_for("アスピリン"), None);
    }

    #[test]
    fn test_unrestricted_record_never_reported() {
        let table = table();
        let matcher = Matcher::new(&table);

        assert!(matcher.find_match("バファリン").is_some());
        assert_eq!(matcher.washout_for("バファリン"), None);
    }

    #[test]
    fn test_closest_tie_break() {
        let table = table();
        let matcher = Matcher::new(&table).with_tie_break(TieBreak::Closest);

        let record = matcher.find_match("バイアスピリン").unwrap();
        assert_eq!(record.product_name, "バイアスピリン");

        // Both rows score 1.0 on the generic key; table order decides
        let record = matcher.find_match("アスピリン").unwrap();
        assert_eq!(record.product_name, "バファリン「A」");
    }

    #[test]
    fn test_empty_candidate_and_empty_keys() {
        let table = table();
        let matcher = Matcher::new(&table);

        assert!(matcher.find_match("").is_none());
        assert!(matcher.find_match("  ").is_none());
        // The blank row must not swallow unknown names
        assert!(matcher.find_match("存在しない薬").is_none());
    }

    #[test]
    fn test_validate_against_table() {
        let table = table();
        let matcher = Matcher::new(&table);

        let validated = matcher.validate_against_table(&[
            "アクトス",
            "架空薬",
            "バファリン",
            "",
        ]);
        assert_eq!(validated, vec!["アクトス", "バファリン"]);
    }

    #[test]
    fn test_match_names_dedupes() {
        let table = table();
        let matcher = Matcher::new(&table);

        let results = matcher.match_names(&["アクトス", "架空薬", "アクトス", "プラビックス"]);
        assert_eq!(
            results,
            vec![
                MatchResult::new("アクトス", "7日間"),
                MatchResult::new("プラビックス", "14日間"),
            ]
        );
    }

    #[test]
    fn test_tie_break_from_str() {
        assert_eq!("first".parse::<TieBreak>(), Ok(TieBreak::FirstInTable));
        assert_eq!("Closest".parse::<TieBreak>(), Ok(TieBreak::Closest));
        assert!("longest".parse::<TieBreak>().is_err());
    }
}
