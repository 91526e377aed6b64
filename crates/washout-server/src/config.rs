//! Server configuration.
//!
//! Every setting comes from an environment variable with a default, except
//! the vision API key. Unparseable or zero limits are rejected at startup, as
//! is a per-request image limit above the extraction ceiling: a batch must
//! never be turned away by its own images.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use washout_core::TieBreak;
use washout_llm::{GateConfig, VisionConfig};

pub const BIND_ADDR_VAR: &str = "WASHOUT_BIND_ADDR";
pub const TABLE_PATH_VAR: &str = "WASHOUT_TABLE_PATH";
pub const MAX_CONCURRENT_VAR: &str = "WASHOUT_MAX_CONCURRENT_EXTRACTIONS";
pub const TIMEOUT_MS_VAR: &str = "WASHOUT_EXTRACTION_TIMEOUT_MS";
pub const MAX_IMAGE_BYTES_VAR: &str = "WASHOUT_MAX_IMAGE_BYTES";
pub const MAX_IMAGES_VAR: &str = "WASHOUT_MAX_IMAGES_PER_REQUEST";
pub const STAGING_DIR_VAR: &str = "WASHOUT_STAGING_DIR";
pub const STATIC_DIR_VAR: &str = "WASHOUT_STATIC_DIR";
pub const TIE_BREAK_VAR: &str = "WASHOUT_TIE_BREAK";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_VAR: &str = "WASHOUT_VISION_MODEL";

/// Allowance for multipart boundaries and headers on top of image bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Limits applied while receiving uploads.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_image_bytes: usize,
    pub max_images_per_request: usize,
    pub staging_dir: PathBuf,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
            max_images_per_request: GateConfig::default().max_concurrent_extractions,
            staging_dir: std::env::temp_dir(),
        }
    }
}

impl UploadLimits {
    /// Request body ceiling for a full batch of images.
    pub fn body_limit(&self) -> usize {
        self.max_image_bytes
            .saturating_mul(self.max_images_per_request)
            .saturating_add(MULTIPART_OVERHEAD)
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub table_path: PathBuf,
    pub gate: GateConfig,
    pub upload: UploadLimits,
    pub static_dir: Option<PathBuf>,
    pub tie_break: TieBreak,
    pub vision: VisionConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gate_defaults = GateConfig::default();
        let upload_defaults = UploadLimits::default();

        let gate = GateConfig {
            max_concurrent_extractions: positive(
                MAX_CONCURRENT_VAR,
                get(MAX_CONCURRENT_VAR),
                gate_defaults.max_concurrent_extractions,
            )?,
            extraction_timeout_ms: positive(
                TIMEOUT_MS_VAR,
                get(TIMEOUT_MS_VAR),
                gate_defaults.extraction_timeout_ms,
            )?,
        };

        let upload = UploadLimits {
            max_image_bytes: positive(
                MAX_IMAGE_BYTES_VAR,
                get(MAX_IMAGE_BYTES_VAR),
                upload_defaults.max_image_bytes,
            )?,
            max_images_per_request: positive(
                MAX_IMAGES_VAR,
                get(MAX_IMAGES_VAR),
                // Unset follows the configured ceiling
                gate.max_concurrent_extractions,
            )?,
            staging_dir: get(STAGING_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(upload_defaults.staging_dir),
        };

        if upload.max_images_per_request > gate.max_concurrent_extractions {
            return Err(ConfigError::Invalid {
                name: MAX_IMAGES_VAR,
                value: upload.max_images_per_request.to_string(),
                reason: format!(
                    "must not exceed {MAX_CONCURRENT_VAR} ({})",
                    gate.max_concurrent_extractions
                ),
            });
        }

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let mut vision = VisionConfig::new(api_key);
        if let Some(base_url) = get(BASE_URL_VAR) {
            vision.base_url = base_url;
        }
        if let Some(model) = get(MODEL_VAR) {
            vision.model = model;
        }

        Ok(Self {
            bind_addr: parsed(BIND_ADDR_VAR, get(BIND_ADDR_VAR), "0.0.0.0:3000".parse().ok())?,
            table_path: get(TABLE_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("drugs.csv")),
            gate,
            upload,
            static_dir: get(STATIC_DIR_VAR).map(PathBuf::from),
            tie_break: parsed(TIE_BREAK_VAR, get(TIE_BREAK_VAR), Some(TieBreak::default()))?,
            vision,
        })
    }
}

fn parsed<T>(name: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

fn positive<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = parsed(name, raw.clone(), Some(default))?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
