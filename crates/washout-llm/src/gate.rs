//! Bounded admission for extraction calls.
//!
//! The vision service is slow, rate-limited and fallible. The gate admits at
//! most `max_concurrent_extractions` calls at once and turns everything
//! beyond that away immediately with [`ExtractionError::Busy`]; there is no
//! queue. Each admitted call holds a semaphore permit for exactly its own
//! lifetime, so the in-flight count is restored on every exit path,
//! including cancellation of the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::client::VisionExtractor;
use crate::extraction::{parse_drug_names, ExtractionError, ExtractionResult};
use crate::staging::{fingerprint, StagedImage};

/// Admission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Ceiling on simultaneous extraction calls
    pub max_concurrent_extractions: usize,
    /// Deadline for a single collaborator call
    pub extraction_timeout_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: 3,
            extraction_timeout_ms: 20_000,
        }
    }
}

impl GateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }
}

/// Admission controller in front of a [`VisionExtractor`].
#[derive(Clone)]
pub struct ExtractionGate {
    extractor: Arc<dyn VisionExtractor>,
    permits: Arc<Semaphore>,
    config: GateConfig,
}

impl ExtractionGate {
    pub fn new(extractor: Arc<dyn VisionExtractor>, config: GateConfig) -> Self {
        Self {
            extractor,
            permits: Arc::new(Semaphore::new(config.max_concurrent_extractions)),
            config,
        }
    }

    /// Extract candidate names from a staged image.
    ///
    /// The staged file is removed before this returns, whatever the outcome.
    pub async fn extract(&self, image: StagedImage) -> ExtractionResult<Vec<String>> {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    limit = self.capacity(),
                    "Extraction rejected: admission ceiling reached"
                );
                image.discard();
                return Err(ExtractionError::Busy {
                    limit: self.capacity(),
                });
            }
        };

        let result = self.run(&image).await;
        image.discard();
        drop(permit);
        result
    }

    async fn run(&self, image: &StagedImage) -> ExtractionResult<Vec<String>> {
        let bytes = image
            .read()
            .await
            .map_err(|e| ExtractionError::Failed(format!("could not read staged image: {e}")))?;

        let image_id = fingerprint(&bytes);
        info!(
            image = %image_id,
            size = bytes.len(),
            in_flight = self.in_flight(),
            "Extraction admitted"
        );

        let timeout = self.config.timeout();
        let raw = match tokio::time::timeout(timeout, self.extractor.extract_raw(&bytes)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(image = %image_id, error = %e, "Extraction call failed");
                return Err(e);
            }
            Err(_) => {
                warn!(image = %image_id, timeout_ms = self.config.extraction_timeout_ms, "Extraction call timed out");
                return Err(ExtractionError::Timeout(timeout));
            }
        };

        let names = parse_drug_names(&raw).map_err(|e| {
            warn!(image = %image_id, raw = %raw, "Extraction output is not a JSON array");
            e
        })?;

        info!(image = %image_id, names = names.len(), "Extraction complete");
        Ok(names)
    }

    /// Calls currently admitted.
    pub fn in_flight(&self) -> usize {
        self.capacity()
            .saturating_sub(self.permits.available_permits())
    }

    /// Admission ceiling.
    pub fn capacity(&self) -> usize {
        self.config.max_concurrent_extractions
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}
