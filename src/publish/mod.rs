//! Publishing a staged site to the hosting provider.
//!
//! ```text
//! ensure_repo (GET, POST on 404) ──> commit + force-push (git2) ──> Pages (POST, PUT on conflict)
//! ```
//!
//! Each step mutates remote state and none is rolled back: a failure part way
//! leaves the remote as the last successful step left it.

pub mod git;
pub mod github;
pub mod liveness;

pub use github::{GitHubClient, PagesActivation, RepoStatus};
pub use liveness::LivenessProbe;

use std::path::Path;

use anyhow::Context;

use crate::config::GitHubSettings;
use crate::errors::PipelineError;
use crate::models::PublishResult;
use git::{Author, PushTarget};

/// Makes a staged directory the content of a served repository.
pub struct RepositoryPublisher {
    github: GitHubClient,
    settings: GitHubSettings,
}

impl RepositoryPublisher {
    pub fn new(settings: &GitHubSettings) -> anyhow::Result<Self> {
        Ok(Self {
            github: GitHubClient::new(settings)?,
            settings: settings.clone(),
        })
    }

    pub fn commit_message(round: u32) -> String {
        format!("Round {} update", round)
    }

    fn push_target(&self, repo: &str) -> PushTarget {
        PushTarget {
            remote_url: self.settings.remote_url(repo),
            branch: self.settings.branch.clone(),
            username: self.settings.account.clone(),
            token: self.settings.token.expose().to_string(),
        }
    }

    fn author(&self) -> Author {
        Author {
            name: self.settings.account.clone(),
            email: self.settings.author_email(),
        }
    }

    /// Publish `dir` as repository `repo`. Returns the URLs and commit SHA.
    pub async fn publish(&self, dir: &Path, repo: &str, round: u32) -> Result<PublishResult, PipelineError> {
        let status = self
            .github
            .ensure_repo(repo)
            .await
            .map_err(PipelineError::Repository)?;
        tracing::info!(repo, ?status, "repository ready");

        let dir = dir.to_path_buf();
        let message = Self::commit_message(round);
        let author = self.author();
        let target = self.push_target(repo);
        let commit_sha = tokio::task::spawn_blocking(move || {
            git::commit_and_push(&dir, &message, &author, &target)
        })
        .await
        .context("Git worker panicked")
        .and_then(|res| res)
        .map_err(PipelineError::Git)?;
        tracing::info!(repo, commit_sha = %commit_sha, "pushed");

        let activation = self
            .github
            .enable_pages(repo, &self.settings.branch)
            .await
            .map_err(PipelineError::Pages)?;
        tracing::info!(repo, ?activation, "static hosting enabled");

        Ok(PublishResult {
            repo_url: self.settings.repo_url(repo),
            pages_url: self.settings.pages_url(repo),
            commit_sha,
        })
    }
}
