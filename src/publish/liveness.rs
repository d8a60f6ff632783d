use std::time::Duration;

use anyhow::Context;

use crate::config::LivenessSettings;
use crate::retry::{RetryOutcome, RetryPolicy, retry_until};

/// Polls a published site until it answers with a success status.
pub struct LivenessProbe {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl LivenessProbe {
    pub fn new(settings: &LivenessSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .context("Failed to build liveness HTTP client")?;
        let policy = RetryPolicy::fixed(
            settings.max_attempts,
            Duration::from_millis(settings.interval_ms),
        )
        .with_backoff(
            settings.backoff_factor,
            Duration::from_millis(settings.max_interval_ms),
        );
        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wait for `url` to go live. Running out of attempts is not an error;
    /// the caller reports the URL either way.
    pub async fn wait_until_live(&self, url: &str) -> RetryOutcome {
        let outcome = retry_until(&self.policy, |attempt| {
            let request = self.http.get(url);
            async move {
                match request.send().await {
                    Ok(resp) if resp.status().is_success() => true,
                    Ok(resp) => {
                        tracing::debug!(attempt, status = %resp.status(), "site not live yet");
                        false
                    }
                    Err(e) => {
                        tracing::debug!(attempt, error = %e, "site probe failed");
                        false
                    }
                }
            }
        })
        .await;

        if outcome.succeeded {
            tracing::info!(url, attempts = outcome.attempts, "site is live");
        } else {
            tracing::warn!(
                url,
                attempts = outcome.attempts,
                "site did not go live within the polling budget; reporting it anyway"
            );
        }
        outcome
    }
}
