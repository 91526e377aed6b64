//! Name resolver for candidate drug names.
//!
//! Pipeline: candidate → normalize → substring match against the table →
//! washout result (if the matched record is restricted).

mod matcher;
mod normalizer;

pub use matcher::*;
pub use normalizer::*;
