//! WLS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, WlsError>;

/// Top-level error type for Wave Load Shaper.
#[derive(Debug, Error)]
pub enum WlsError {
    #[error("[WLS-1001] invalid schedule: {details}")]
    InvalidSchedule { details: String },

    #[error("[WLS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[WLS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[WLS-1004] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[WLS-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[WLS-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[WLS-3002] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[WLS-3101] worker pool failure: {details}")]
    WorkerPool { details: String },

    #[error("[WLS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl WlsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSchedule { .. } => "WLS-1001",
            Self::MissingConfig { .. } => "WLS-1002",
            Self::ConfigParse { .. } => "WLS-1003",
            Self::InvalidConfig { .. } => "WLS-1004",
            Self::Serialization { .. } => "WLS-2101",
            Self::Io { .. } => "WLS-3001",
            Self::ChannelClosed { .. } => "WLS-3002",
            Self::WorkerPool { .. } => "WLS-3101",
            Self::Runtime { .. } => "WLS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::WorkerPool { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for schedule validation failures.
    #[must_use]
    pub fn invalid_schedule(details: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            details: details.into(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for WlsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for WlsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
