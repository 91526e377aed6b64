//! Drug name extraction from prescription photos via a vision model.
//!
//! This crate wraps the external OCR/vision collaborator: the fixed
//! extraction instruction, parsing of its output into candidate names,
//! temporary staging of uploads, and the admission gate that bounds how
//! many extraction calls are in flight at once.

pub mod client;
pub mod extraction;
pub mod gate;
pub mod prompts;
pub mod staging;

pub use client::*;
pub use extraction::*;
pub use gate::*;
pub use prompts::*;
pub use staging::*;
