use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;

use super::StagingDir;
use crate::errors::PipelineError;
use crate::models::{Attachment, validate_attachment_name};

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Decode the payload of a `data:` URI.
///
/// `;base64` payloads are base64-decoded (whitespace ignored); any other
/// payload is percent-decoded.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .context("Not a data URI")?;
    let (header, payload) = rest
        .split_once(',')
        .context("Data URI has no ',' separator")?;

    if header.split(';').any(|param| param.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .context("Data URI payload is not valid base64")
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

/// Resolve where an attachment lands, refusing names that leave `staging`.
pub fn resolve_attachment_path(staging: &Path, name: &str) -> Result<PathBuf> {
    validate_attachment_name(name)
        .map_err(|reason| anyhow::anyhow!("Rejected attachment name '{}': {}", name, reason))?;
    Ok(staging.join(name))
}

/// Writes caller-supplied attachments into a staging directory.
pub struct AttachmentFetcher {
    http: reqwest::Client,
}

impl AttachmentFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build attachment HTTP client")?;
        Ok(Self { http })
    }

    /// Materialize every attachment, overwriting files with the same name.
    /// Returns the written paths in request order.
    pub async fn materialize(
        &self,
        staging: &StagingDir,
        attachments: &[Attachment],
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut written = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let path = self
                .materialize_one(staging.path(), attachment)
                .await
                .map_err(|source| PipelineError::Attachment {
                    name: attachment.name.clone(),
                    source,
                })?;
            written.push(path);
        }
        Ok(written)
    }

    async fn materialize_one(&self, staging: &Path, attachment: &Attachment) -> Result<PathBuf> {
        let path = resolve_attachment_path(staging, &attachment.name)?;
        let bytes = if attachment.is_inline() {
            decode_data_uri(&attachment.url)?
        } else {
            self.fetch(&attachment.url).await?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(
            name = %attachment.name,
            bytes = bytes.len(),
            inline = attachment.is_inline(),
            "attachment materialized"
        );
        Ok(path)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Fetching {} returned error status", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(bytes.to_vec())
    }
}
