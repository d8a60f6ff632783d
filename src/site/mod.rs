//! Local staging of a task's site before it is published.
//!
//! Each task identifier owns one directory under the configured staging root.
//! The directory is created on first use and reused on later rounds: files
//! written by an earlier round stay unless a later round overwrites them.

pub mod attachments;
pub mod builder;

pub use attachments::{AttachmentFetcher, decode_data_uri};
pub use builder::SiteBuilder;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::is_valid_task_id;

/// Per-task staging directory.
#[derive(Debug, Clone)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create (if needed) and return the staging directory for `task`.
    pub fn prepare(root: &Path, task: &str) -> Result<Self> {
        if !is_valid_task_id(task) {
            anyhow::bail!("Invalid task identifier '{}'", task);
        }
        let path = root.join(task);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create staging directory {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
