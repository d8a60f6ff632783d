use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GitHubSettings;

const USER_AGENT: &str = "pagesmith";
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Known GitHub token prefixes.
/// See: https://github.blog/2021-04-05-behind-githubs-new-authentication-token-formats/
const GITHUB_TOKEN_PREFIXES: &[&str] = &[
    "ghp_",        // Personal access tokens (classic)
    "github_pat_", // Fine-grained personal access tokens
    "gho_",        // OAuth access tokens
    "ghu_",        // GitHub App user-to-server tokens
    "ghs_",        // GitHub App server-to-server tokens
    "ghr_",        // GitHub App refresh tokens
];

/// Validate that a string looks like a GitHub token based on its prefix.
///
/// Format check only; it does not verify the token is active or scoped.
pub fn is_valid_github_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    GITHUB_TOKEN_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Debug, Serialize)]
struct PagesRequest<'a> {
    source: PagesSource<'a>,
}

#[derive(Debug, Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

/// A GitHub repository (subset of fields we care about).
#[derive(Debug, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub full_name: String,
    pub name: String,
    pub html_url: String,
}

/// Whether `ensure_repo` found or made the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    Existing,
    Created,
}

/// Which request switched static hosting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagesActivation {
    Created,
    Updated,
}

/// Minimal GitHub REST client for repository and Pages management.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    account: String,
    token: String,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            account: settings.account.clone(),
            token: settings.token.expose().to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
    }

    /// Make sure `name` exists under the account, creating it (public, no
    /// initial commit) when the lookup returns 404.
    pub async fn ensure_repo(&self, name: &str) -> anyhow::Result<RepoStatus> {
        let resp = self
            .request(Method::GET, &format!("/repos/{}/{}", self.account, name))
            .send()
            .await
            .context("Failed to send repository lookup to GitHub")?;

        if resp.status() == StatusCode::NOT_FOUND {
            self.create_repo(name).await?;
            return Ok(RepoStatus::Created);
        }

        resp.error_for_status()
            .context("GitHub repository lookup returned error status")?;
        Ok(RepoStatus::Existing)
    }

    async fn create_repo(&self, name: &str) -> anyhow::Result<GitHubRepo> {
        let body = CreateRepoRequest {
            name,
            private: false,
            auto_init: false,
        };
        let repo = self
            .request(Method::POST, "/user/repos")
            .json(&body)
            .send()
            .await
            .context("Failed to send repository creation to GitHub")?
            .error_for_status()
            .context("GitHub repository creation returned error status")?
            .json::<GitHubRepo>()
            .await
            .context("Failed to parse repository creation response from GitHub")?;
        tracing::info!(repo = %repo.full_name, "repository created");
        Ok(repo)
    }

    /// Serve `branch` of `name` as a static site. An already-enabled site
    /// (409/422 on create) gets one update request instead.
    pub async fn enable_pages(&self, name: &str, branch: &str) -> anyhow::Result<PagesActivation> {
        let path = format!("/repos/{}/{}/pages", self.account, name);
        let body = PagesRequest {
            source: PagesSource { branch, path: "/" },
        };

        let resp = self
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await
            .context("Failed to send Pages activation to GitHub")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(PagesActivation::Created);
        }
        if status != StatusCode::CONFLICT && status != StatusCode::UNPROCESSABLE_ENTITY {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub Pages activation returned {}: {}", status, text);
        }

        tracing::debug!(repo = name, %status, "Pages already enabled, updating source");
        self.request(Method::PUT, &path)
            .json(&body)
            .send()
            .await
            .context("Failed to send Pages update to GitHub")?
            .error_for_status()
            .context("GitHub Pages update returned error status")?;
        Ok(PagesActivation::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::test_helpers::spawn_router;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
    };
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeGitHub {
        existing: Vec<String>,
        lookup_status: Option<u16>,
        pages_status: u16,
        put_status: u16,
        calls: Vec<String>,
        auth_headers: Vec<String>,
    }

    type Shared = Arc<Mutex<FakeGitHub>>;

    async fn lookup(
        State(state): State<Shared>,
        Path((owner, repo)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> AxumStatus {
        let mut s = state.lock().unwrap();
        s.calls.push(format!("GET {}/{}", owner, repo));
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            s.auth_headers.push(auth.to_string());
        }
        if let Some(code) = s.lookup_status {
            return AxumStatus::from_u16(code).unwrap();
        }
        if s.existing.contains(&repo) {
            AxumStatus::OK
        } else {
            AxumStatus::NOT_FOUND
        }
    }

    async fn create(
        State(state): State<Shared>,
        Json(body): Json<serde_json::Value>,
    ) -> (AxumStatus, Json<serde_json::Value>) {
        let mut s = state.lock().unwrap();
        let name = body["name"].as_str().unwrap_or_default().to_string();
        s.calls.push(format!(
            "CREATE {} private={} auto_init={}",
            name, body["private"], body["auto_init"]
        ));
        s.existing.push(name.clone());
        (
            AxumStatus::CREATED,
            Json(serde_json::json!({
                "full_name": format!("octocat/{}", name),
                "name": name,
                "html_url": format!("https://github.com/octocat/{}", name)
            })),
        )
    }

    async fn pages_post(
        State(state): State<Shared>,
        Json(body): Json<serde_json::Value>,
    ) -> AxumStatus {
        let mut s = state.lock().unwrap();
        s.calls.push(format!("PAGES POST {}", body["source"]["branch"]));
        AxumStatus::from_u16(s.pages_status).unwrap()
    }

    async fn pages_put(State(state): State<Shared>) -> AxumStatus {
        let mut s = state.lock().unwrap();
        s.calls.push("PAGES PUT".to_string());
        AxumStatus::from_u16(s.put_status).unwrap()
    }

    async fn fake(state: FakeGitHub) -> (GitHubClient, Shared) {
        let shared = Arc::new(Mutex::new(state));
        let router = Router::new()
            .route("/repos/{owner}/{repo}", get(lookup))
            .route("/user/repos", post(create))
            .route("/repos/{owner}/{repo}/pages", post(pages_post).put(pages_put))
            .with_state(shared.clone());
        let base = spawn_router(router).await;
        let settings = GitHubSettings {
            account: "octocat".to_string(),
            token: Secret::new("ghp_test"),
            api_url: base,
            ..GitHubSettings::default()
        };
        (GitHubClient::new(&settings).unwrap(), shared)
    }

    #[tokio::test]
    async fn test_missing_repo_is_created_once() {
        let (client, state) = fake(FakeGitHub::default()).await;
        let status = client.ensure_repo("demo-42").await.unwrap();
        assert_eq!(status, RepoStatus::Created);
        let s = state.lock().unwrap();
        assert_eq!(
            s.calls,
            vec![
                "GET octocat/demo-42".to_string(),
                "CREATE demo-42 private=false auto_init=false".to_string()
            ]
        );
        assert_eq!(s.auth_headers, vec!["Bearer ghp_test".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_repo_is_not_created() {
        let (client, state) = fake(FakeGitHub {
            existing: vec!["demo-42".to_string()],
            ..FakeGitHub::default()
        })
        .await;
        assert_eq!(client.ensure_repo("demo-42").await.unwrap(), RepoStatus::Existing);
        let s = state.lock().unwrap();
        assert!(s.calls.iter().all(|c| !c.starts_with("CREATE")));
    }

    #[tokio::test]
    async fn test_lookup_error_other_than_404_is_fatal() {
        let (client, state) = fake(FakeGitHub {
            lookup_status: Some(500),
            ..FakeGitHub::default()
        })
        .await;
        assert!(client.ensure_repo("demo-42").await.is_err());
        assert!(state.lock().unwrap().calls.iter().all(|c| !c.starts_with("CREATE")));
    }

    #[tokio::test]
    async fn test_pages_created_on_first_request() {
        let (client, state) = fake(FakeGitHub {
            pages_status: 201,
            ..FakeGitHub::default()
        })
        .await;
        let activation = client.enable_pages("demo-42", "main").await.unwrap();
        assert_eq!(activation, PagesActivation::Created);
        assert_eq!(state.lock().unwrap().calls, vec!["PAGES POST \"main\"".to_string()]);
    }

    #[tokio::test]
    async fn test_pages_conflict_falls_back_to_update() {
        let (client, state) = fake(FakeGitHub {
            pages_status: 409,
            put_status: 204,
            ..FakeGitHub::default()
        })
        .await;
        let activation = client.enable_pages("demo-42", "main").await.unwrap();
        assert_eq!(activation, PagesActivation::Updated);
        assert_eq!(
            state.lock().unwrap().calls,
            vec!["PAGES POST \"main\"".to_string(), "PAGES PUT".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pages_update_failure_propagates() {
        let (client, _state) = fake(FakeGitHub {
            pages_status: 409,
            put_status: 500,
            ..FakeGitHub::default()
        })
        .await;
        assert!(client.enable_pages("demo-42", "main").await.is_err());
    }

    #[tokio::test]
    async fn test_pages_other_failure_does_not_retry() {
        let (client, state) = fake(FakeGitHub {
            pages_status: 403,
            put_status: 204,
            ..FakeGitHub::default()
        })
        .await;
        assert!(client.enable_pages("demo-42", "main").await.is_err());
        assert_eq!(state.lock().unwrap().calls.len(), 1);
    }

    // ── is_valid_github_token ────────────────────────────────────────

    #[test]
    fn test_valid_personal_access_token_classic() {
        assert!(is_valid_github_token("ghp_abc123def456"));
    }

    #[test]
    fn test_valid_fine_grained_pat() {
        assert!(is_valid_github_token("github_pat_abc123def456"));
    }

    #[test]
    fn test_empty_token_is_invalid() {
        assert!(!is_valid_github_token(""));
    }

    #[test]
    fn test_wrong_prefix_is_invalid() {
        assert!(!is_valid_github_token("ghx_abc123"));
        assert!(!is_valid_github_token("GHP_abc123"));
    }

    // ── GitHubRepo deserialization ───────────────────────────────────

    #[test]
    fn test_github_repo_ignores_extra_fields() {
        let json = r#"{
            "full_name": "octocat/demo-42",
            "name": "demo-42",
            "private": false,
            "html_url": "https://github.com/octocat/demo-42",
            "default_branch": "main"
        }"#;
        let repo: GitHubRepo = serde_json::from_str(json).unwrap();
        assert_eq!(repo.full_name, "octocat/demo-42");
        assert_eq!(repo.html_url, "https://github.com/octocat/demo-42");
    }
}
