//! The publish pipeline: one task request in, one published site out.
//!
//! Stages run strictly in order and the first failure ends the run:
//!
//! 1. validate the request
//! 2. generate the entry document from the brief
//! 3. prepare the staging directory and materialize attachments
//! 4. write `index.html`, `LICENSE`, `README.md`
//! 5. ensure the repository, commit, force-push, enable Pages
//! 6. poll the site URL (best-effort)
//! 7. notify the evaluation URL (best-effort)
//!
//! Runs for the same task identifier are serialized by [`TaskLocks`].

pub mod locks;

pub use locks::TaskLocks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::errors::PipelineError;
use crate::generator::{ContentGenerator, GeminiClient, TextGenerator};
use crate::models::{CallbackPayload, PublishResult, TaskRequest};
use crate::notify::CallbackNotifier;
use crate::publish::{LivenessProbe, RepositoryPublisher};
use crate::site::{AttachmentFetcher, SiteBuilder, StagingDir};

/// Runs a task request to completion.
/// Real implementation: `Pipeline`. Server and job queue tests use mocks.
#[async_trait]
pub trait PublishRunner: Send + Sync {
    async fn run(&self, request: TaskRequest) -> Result<PublishResult, PipelineError>;
}

pub struct Pipeline {
    generator: ContentGenerator,
    fetcher: AttachmentFetcher,
    builder: SiteBuilder,
    publisher: RepositoryPublisher,
    liveness: LivenessProbe,
    notifier: CallbackNotifier,
    staging_root: PathBuf,
    locks: TaskLocks,
}

impl Pipeline {
    /// Build a pipeline wired to the configured Gemini model.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let model = GeminiClient::new(&config.llm)?;
        Self::with_generator(config, Arc::new(model))
    }

    /// Build a pipeline around a caller-supplied text model.
    pub fn with_generator(config: &AppConfig, model: Arc<dyn TextGenerator>) -> anyhow::Result<Self> {
        Ok(Self {
            generator: ContentGenerator::new(model),
            fetcher: AttachmentFetcher::new()?,
            builder: SiteBuilder::new(config.github.account.clone()),
            publisher: RepositoryPublisher::new(&config.github)?,
            liveness: LivenessProbe::new(&config.liveness)?,
            notifier: CallbackNotifier::new(&config.callback)?,
            staging_root: config.staging_dir.clone(),
            locks: TaskLocks::new(),
        })
    }

    pub fn locks(&self) -> &TaskLocks {
        &self.locks
    }

    #[tracing::instrument(name = "pipeline", skip_all, fields(task = %request.task, round = request.round))]
    pub async fn execute(&self, request: &TaskRequest) -> Result<PublishResult, PipelineError> {
        request.validate().map_err(PipelineError::InvalidRequest)?;

        let _guard = self.locks.acquire(&request.task).await;
        let started = Instant::now();

        tracing::info!(stage = "generate", "stage started");
        let markup = self
            .generator
            .generate_site(&request.brief)
            .await
            .map_err(PipelineError::Generation)?;

        tracing::info!(stage = "attachments", count = request.attachments.len(), "stage started");
        let staging =
            StagingDir::prepare(&self.staging_root, &request.task).map_err(PipelineError::Site)?;
        self.fetcher.materialize(&staging, &request.attachments).await?;

        tracing::info!(stage = "site", dir = %staging.path().display(), "stage started");
        self.builder
            .write(staging.path(), &request.task, request.round, &markup)
            .map_err(PipelineError::Site)?;

        tracing::info!(stage = "publish", "stage started");
        let result = self
            .publisher
            .publish(staging.path(), &request.task, request.round)
            .await?;

        self.liveness.wait_until_live(&result.pages_url).await;

        let payload = CallbackPayload::new(request, &result);
        let outcome = self
            .notifier
            .notify(request.evaluation_url.as_deref(), &payload)
            .await;

        tracing::info!(
            commit_sha = %result.commit_sha,
            pages_url = %result.pages_url,
            callback = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl PublishRunner for Pipeline {
    async fn run(&self, request: TaskRequest) -> Result<PublishResult, PipelineError> {
        match self.execute(&request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(task = %request.task, round = request.round, stage = e.stage(), error = %e, "pipeline failed");
                Err(e)
            }
        }
    }
}
