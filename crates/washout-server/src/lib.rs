//! HTTP service for washout checks.
//!
//! Accepts prescription photos (`POST /ocr`) or an edited name list
//! (`POST /recheck`) and reports which drugs require withdrawal before a
//! procedure, and for how long.

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod router;
pub mod upload;

use std::sync::Arc;

pub use config::{ConfigError, ServerConfig, UploadLimits};
pub use error::{CheckError, CheckResult};
pub use orchestrator::{AnalysisReport, MatchReport, Orchestrator};
pub use router::build_router;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub limits: Arc<UploadLimits>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, limits: UploadLimits) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            limits: Arc::new(limits),
        }
    }
}
