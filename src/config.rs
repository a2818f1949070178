//! Process configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] =
    ["http://localhost:5173", "https://your-frontend.onrender.com"];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one allowed origin is required")]
    NoOrigins,

    #[error("invalid CORS origin '{0}': expected an http:// or https:// origin")]
    InvalidOrigin(String),

    #[error("port must be non-zero")]
    ZeroPort,

    #[error("max upload size must be non-zero")]
    ZeroUploadLimit,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "classify-backend", version, about = "Image and PDF classification service")]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "CLASSIFY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "CLASSIFY_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Directory holding model.onnx, config.json and preprocessor_config.json.
    #[arg(long, env = "CLASSIFY_MODEL_DIR", default_value = "model")]
    pub model_dir: PathBuf,

    /// Origins allowed to call the API cross-origin (comma separated).
    #[arg(
        long = "allowed-origin",
        env = "CLASSIFY_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_ALLOWED_ORIGINS.map(String::from)
    )]
    pub allowed_origins: Vec<String>,

    /// Directory containing the pdfium shared library. Uses the system library when unset.
    #[arg(long, env = "PDFIUM_DYNAMIC_LIB_PATH")]
    pub pdfium_dir: Option<PathBuf>,

    /// Largest accepted upload, in bytes.
    #[arg(long, env = "CLASSIFY_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Number of HTTP worker threads. Defaults to one per core.
    #[arg(long, env = "CLASSIFY_WORKERS")]
    pub workers: Option<usize>,
}

impl Config {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        if self.allowed_origins.is_empty() {
            return Err(ConfigError::NoOrigins);
        }
        for origin in &self.allowed_origins {
            let valid_scheme = origin.starts_with("http://") || origin.starts_with("https://");
            if !valid_scheme || origin.contains('*') || origin.ends_with('/') {
                return Err(ConfigError::InvalidOrigin(origin.clone()));
            }
        }
        Ok(())
    }
}
