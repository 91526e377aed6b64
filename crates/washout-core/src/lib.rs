//! Washout-Check Core Library
//!
//! Reconciles OCR-noisy medication names against a reference table of drugs
//! that must be withdrawn before a procedure.
//!
//! # Architecture
//!
//! ```text
//! Candidate names ──► normalize ──► Matcher ──► MatchResult (deduplicated)
//!                                      │
//!                              ReferenceTable
//!                        (loaded once, read-only, keys
//!                         precomputed at load time)
//! ```
//!
//! # Core Principle
//!
//! **A missed washout is worse than a spurious one.** Matching is a
//! permissive bidirectional substring test so that truncated or padded OCR
//! output still hits the table.
//!
//! # Modules
//!
//! - [`models`]: Domain types (DrugRecord, MatchResult)
//! - [`resolver`]: Name normalization and the match engine
//! - [`table`]: Reference table snapshot and its CSV/JSON loaders

pub mod models;
pub mod resolver;
pub mod table;

// Re-export commonly used types
pub use models::{dedupe_names, dedupe_results, DrugRecord, MatchResult};
pub use resolver::{normalize, Matcher, TieBreak};
pub use table::{ReferenceTable, TableError, TableResult};
