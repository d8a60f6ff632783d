//! Typed error hierarchy for pagesmith.
//!
//! Three top-level enums cover the three subsystems:
//! - `ConfigError`: loading and validating process configuration
//! - `PipelineError`: per-request publish pipeline failures
//! - `JobError`: deferred job queue admission failures
//!
//! Stage variants of `PipelineError` wrap an `anyhow::Error` so the context
//! chain built inside each component survives up to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration value {key} (set it in the config file or the environment)")]
    Missing { key: &'static str },

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Errors from a single publish pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),

    #[error("Attachment '{name}' could not be materialized: {source:#}")]
    Attachment {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write site files: {0:#}")]
    Site(#[source] anyhow::Error),

    #[error("Repository setup failed: {0:#}")]
    Repository(#[source] anyhow::Error),

    #[error("Commit or push failed: {0:#}")]
    Git(#[source] anyhow::Error),

    #[error("Static hosting activation failed: {0:#}")]
    Pages(#[source] anyhow::Error),
}

impl PipelineError {
    /// Short stage name used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "validate",
            Self::Generation(_) => "generate",
            Self::Attachment { .. } => "attachments",
            Self::Site(_) => "site",
            Self::Repository(_) => "repository",
            Self::Git(_) => "push",
            Self::Pages(_) => "pages",
        }
    }
}

/// Errors from submitting work to the deferred job queue.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job queue is full ({capacity} pending jobs)")]
    QueueFull { capacity: usize },

    #[error("Job queue is shut down")]
    QueueClosed,
}
