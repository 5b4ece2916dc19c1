//! error.rs — configuration errors for the vario pipeline
//!
//! Sample processing itself never fails: missing or non-finite inputs are
//! substituted with 0. Only constructing a filter or loading configuration
//! can be rejected.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VarioError {
    /// C = 0, or R = Q = 0, leaves the seed or the gain undefined.
    #[error("degenerate Kalman filter: C must be non-zero and R, Q must not both be zero")]
    DegenerateFilter,

    #[error("filter parameter {name} must be finite (got {value})")]
    NonFiniteParameter { name: &'static str, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VarioError>;
