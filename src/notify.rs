use std::time::Duration;

use anyhow::Context;

use crate::config::CallbackSettings;
use crate::models::CallbackPayload;

/// What happened to a callback. Informational only; callers never fail on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Failed,
    Skipped,
}

impl NotifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Posts publish results to the caller's evaluation URL, best-effort.
pub struct CallbackNotifier {
    http: reqwest::Client,
}

impl CallbackNotifier {
    pub fn new(settings: &CallbackSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("Failed to build callback HTTP client")?;
        Ok(Self { http })
    }

    pub async fn notify(&self, url: Option<&str>, payload: &CallbackPayload) -> NotifyOutcome {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            tracing::debug!(task = %payload.task, "no evaluation URL; callback skipped");
            return NotifyOutcome::Skipped;
        };

        match self.http.post(url).json(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(task = %payload.task, url, status = %resp.status(), "callback delivered");
                NotifyOutcome::Delivered
            }
            Ok(resp) => {
                tracing::warn!(task = %payload.task, url, status = %resp.status(), "callback rejected");
                NotifyOutcome::Failed
            }
            Err(e) => {
                tracing::warn!(task = %payload.task, url, error = %e, "callback failed");
                NotifyOutcome::Failed
            }
        }
    }
}
