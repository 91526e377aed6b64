//! Domain models for the washout-check system.

mod record;
mod result;

pub use record::*;
pub use result::*;
