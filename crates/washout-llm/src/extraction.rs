//! Candidate name extraction from vision model output.

use std::time::Duration;

use thiserror::Error;

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction capacity reached ({limit} calls in flight)")]
    Busy { limit: usize },

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("Output is not a JSON array of strings: {source}")]
    MalformedOutput {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        ExtractionError::Failed(e.to_string())
    }
}

/// Strip the Markdown code fences models like to wrap JSON in.
pub fn sanitize_output(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse model output into candidate drug names.
pub fn parse_drug_names(raw: &str) -> ExtractionResult<Vec<String>> {
    let text = sanitize_output(raw);

    match serde_json::from_str::<Vec<String>>(&text) {
        Ok(names) => Ok(names),
        Err(source) => {
            // Valid JSON of the wrong shape is not retried
            let is_json = serde_json::from_str::<serde_json::Value>(&text).is_ok();

            // Try to find the array in case the model adds extra text
            if let Some(slice) = bracketed_array(&text).filter(|_| !is_json) {
                if let Ok(names) = serde_json::from_str::<Vec<String>>(slice) {
                    return Ok(names);
                }
            }
            Err(ExtractionError::MalformedOutput { raw: text, source })
        }
    }
}

fn bracketed_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}
