use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Secret;

/// Repository names GitHub accepts, capped at its 100 character limit.
static TASK_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("valid task id pattern"));

/// A file supplied with a task, either inline (`data:` URI) or by URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

impl Attachment {
    pub fn is_inline(&self) -> bool {
        self.url.starts_with("data:")
    }
}

fn default_round() -> u32 {
    1
}

/// A caller-submitted unit of work.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub secret: Secret,
    pub email: String,
    /// Task identifier; also the remote repository name
    pub task: String,
    pub nonce: String,
    pub brief: String,
    #[serde(default = "default_round")]
    pub round: u32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
    /// Accepted for compatibility; not evaluated
    #[serde(default)]
    pub checks: Vec<serde_json::Value>,
}

impl TaskRequest {
    /// Reject requests the pipeline cannot safely run.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_task_id(&self.task) {
            return Err(format!(
                "Invalid task identifier '{}': use 1-100 letters, digits, '.', '-' or '_'",
                self.task
            ));
        }
        if self.brief.trim().is_empty() {
            return Err("Brief must not be empty".to_string());
        }
        for attachment in &self.attachments {
            validate_attachment_name(&attachment.name)
                .map_err(|reason| format!("Invalid attachment name '{}': {}", attachment.name, reason))?;
        }
        Ok(())
    }
}

pub fn is_valid_task_id(task: &str) -> bool {
    task != "." && task != ".." && TASK_ID_PATTERN.is_match(task)
}

/// An attachment name must stay inside the staging directory: relative,
/// non-empty, and made only of plain path segments.
pub fn validate_attachment_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if name.contains('\\') {
        return Err("backslashes are not allowed".to_string());
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return Err("absolute paths are not allowed".to_string());
    }
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => return Err("'..' segments are not allowed".to_string()),
            Component::CurDir => return Err("'.' segments are not allowed".to_string()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("absolute paths are not allowed".to_string());
            }
        }
    }
    if name.ends_with('/') {
        return Err("name must refer to a file".to_string());
    }
    if path.components().any(|c| c.as_os_str() == ".git") {
        return Err("'.git' is reserved".to_string());
    }
    Ok(())
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishResult {
    pub repo_url: String,
    pub pages_url: String,
    pub commit_sha: String,
}

/// Body posted to the caller's evaluation URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackPayload {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl CallbackPayload {
    pub fn new(request: &TaskRequest, result: &PublishResult) -> Self {
        Self {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: result.repo_url.clone(),
            commit_sha: result.commit_sha.clone(),
            pages_url: result.pages_url.clone(),
        }
    }
}
