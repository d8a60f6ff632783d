//! Process configuration for pagesmith.
//!
//! Configuration is read once at startup and never reloaded. It is layered:
//! built-in defaults, then an optional `pagesmith.toml`, then environment
//! variables (a `.env` file is loaded into the environment by `main`).
//!
//! # Configuration File Format
//!
//! ```toml
//! secret = "shared-secret"
//! staging_dir = "/var/lib/pagesmith"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! mode = "deferred"
//! workers = 4
//! queue_capacity = 64
//!
//! [llm]
//! api_key = "..."
//! model = "gemini-2.5-flash"
//!
//! [github]
//! account = "octocat"
//! token = "ghp_..."
//!
//! [liveness]
//! interval_ms = 3000
//! max_attempts = 20
//!
//! [callback]
//! timeout_ms = 10000
//! ```
//!
//! # Environment overrides
//!
//! | Variable                | Field                 |
//! |-------------------------|-----------------------|
//! | `GEMINI_API_KEY`        | `llm.api_key`         |
//! | `GITHUB_USERNAME`       | `github.account`      |
//! | `GITHUB_TOKEN`          | `github.token`        |
//! | `SECRET_KEY`            | `secret`              |
//! | `PAGESMITH_HOST`        | `server.host`         |
//! | `PAGESMITH_PORT`        | `server.port`         |
//! | `PAGESMITH_MODE`        | `server.mode`         |
//! | `PAGESMITH_STAGING_DIR` | `staging_dir`         |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ConfigError;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "pagesmith.toml";

/// How accepted requests are executed. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Run the pipeline inside the request and return its result.
    Sync,
    /// Queue the pipeline and acknowledge immediately.
    #[default]
    Deferred,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sync => write!(f, "sync"),
            ExecutionMode::Deferred => write!(f, "deferred"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(ExecutionMode::Sync),
            "deferred" => Ok(ExecutionMode::Deferred),
            _ => anyhow::bail!("Invalid execution mode '{}'. Valid values: sync, deferred", s),
        }
    }
}

/// A credential or shared secret. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare against a candidate through fixed-length digests.
    pub fn matches(&self, candidate: &Secret) -> bool {
        let ours = Sha256::digest(self.0.as_bytes());
        let theirs = Sha256::digest(candidate.0.as_bytes());
        ours.iter()
            .zip(theirs.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            serializer.serialize_str("")
        } else {
            serializer.serialize_str("***")
        }
    }
}

/// Inbound HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub mode: ExecutionMode,
    /// Worker tasks draining the deferred queue
    pub workers: usize,
    /// Pending jobs accepted before new requests are refused
    pub queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            mode: ExecutionMode::default(),
            workers: 4,
            queue_capacity: 64,
        }
    }
}

/// Text-generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: Secret,
    pub model: String,
    pub api_url: String,
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: Secret::default(),
            model: "gemini-2.5-flash".to_string(),
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Repository hosting provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// Account that owns the generated repositories
    pub account: String,
    pub token: Secret,
    pub api_url: String,
    /// Base for repository web URLs and git remotes
    pub web_url: String,
    /// Base for published sites; `https://<account>.github.io` when unset
    pub pages_url: Option<String>,
    pub branch: String,
    /// Commit author email; the account's noreply address when unset
    pub author_email: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            account: String::new(),
            token: Secret::default(),
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            pages_url: None,
            branch: "main".to_string(),
            author_email: None,
        }
    }
}

impl GitHubSettings {
    pub fn repo_url(&self, repo: &str) -> String {
        format!("{}/{}/{}", self.web_url.trim_end_matches('/'), self.account, repo)
    }

    pub fn remote_url(&self, repo: &str) -> String {
        format!("{}.git", self.repo_url(repo))
    }

    pub fn pages_url(&self, repo: &str) -> String {
        let base = match &self.pages_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}.github.io", self.account),
        };
        format!("{}/{}/", base, repo)
    }

    pub fn author_email(&self) -> String {
        self.author_email
            .clone()
            .unwrap_or_else(|| format!("{}@users.noreply.github.com", self.account))
    }
}

/// Published-site liveness polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessSettings {
    pub interval_ms: u64,
    pub max_attempts: u32,
    /// Multiplier applied to the interval after each failed attempt
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            max_attempts: 20,
            backoff_factor: 1.0,
            max_interval_ms: 30_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Completion callback delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    pub timeout_ms: u64,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Top-level configuration, passed explicitly to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shared secret every task request must carry
    pub secret: Secret,
    /// Root under which per-task staging directories are created
    pub staging_dir: PathBuf,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub github: GitHubSettings,
    pub liveness: LivenessSettings,
    pub callback: CallbackSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            secret: Secret::default(),
            staging_dir: std::env::temp_dir().join("pagesmith"),
            server: ServerSettings::default(),
            llm: LlmSettings::default(),
            github: GitHubSettings::default(),
            liveness: LivenessSettings::default(),
            callback: CallbackSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from `pagesmith.toml` in the working directory if
    /// it exists, then apply the process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, without checking required values.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let file = match path {
            Some(path) => Some(path),
            None if default_path.exists() => Some(default_path),
            None => None,
        };
        Self::layered(file, |key| std::env::var(key).ok())
    }

    /// Build from an optional file and an environment lookup function.
    pub fn from_sources<F>(file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::layered(file, env)?;
        config.validate()?;
        Ok(config)
    }

    fn layered<F>(file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = lookup("GEMINI_API_KEY") {
            self.llm.api_key = Secret::new(v);
        }
        if let Some(v) = lookup("GITHUB_USERNAME") {
            self.github.account = v;
        }
        if let Some(v) = lookup("GITHUB_TOKEN") {
            self.github.token = Secret::new(v);
        }
        if let Some(v) = lookup("SECRET_KEY") {
            self.secret = Secret::new(v);
        }
        if let Some(v) = lookup("PAGESMITH_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PAGESMITH_PORT") {
            self.server.port = v.parse().map_err(|e| ConfigError::Invalid {
                key: "PAGESMITH_PORT".to_string(),
                message: format!("{}", e),
            })?;
        }
        if let Some(v) = lookup("PAGESMITH_MODE") {
            self.server.mode = v.parse().map_err(|e: anyhow::Error| ConfigError::Invalid {
                key: "PAGESMITH_MODE".to_string(),
                message: e.to_string(),
            })?;
        }
        if let Some(v) = lookup("PAGESMITH_STAGING_DIR") {
            self.staging_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Check required values and numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::Missing { key: "GEMINI_API_KEY" });
        }
        if self.github.account.is_empty() {
            return Err(ConfigError::Missing { key: "GITHUB_USERNAME" });
        }
        if self.github.token.is_empty() {
            return Err(ConfigError::Missing { key: "GITHUB_TOKEN" });
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Missing { key: "SECRET_KEY" });
        }
        if self.server.workers == 0 {
            return Err(invalid("server.workers", "must be at least 1"));
        }
        if self.server.queue_capacity == 0 {
            return Err(invalid("server.queue_capacity", "must be at least 1"));
        }
        if self.liveness.max_attempts == 0 {
            return Err(invalid("liveness.max_attempts", "must be at least 1"));
        }
        if self.liveness.backoff_factor.is_nan() || self.liveness.backoff_factor < 1.0 {
            return Err(invalid("liveness.backoff_factor", "must be >= 1.0"));
        }
        if self.github.branch.trim().is_empty() {
            return Err(invalid("github.branch", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GEMINI_API_KEY", "gem-key"),
            ("GITHUB_USERNAME", "octocat"),
            ("GITHUB_TOKEN", "ghp_token"),
            ("SECRET_KEY", "s3cret"),
        ]
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.mode, ExecutionMode::Deferred);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.liveness.interval_ms, 3_000);
        assert_eq!(config.liveness.max_attempts, 20);
        assert_eq!(config.callback.timeout_ms, 10_000);
        assert_eq!(config.github.branch, "main");
    }

    #[test]
    fn test_env_supplies_required_values() {
        let config = AppConfig::from_sources(None, env_from(&required_env())).unwrap();
        assert_eq!(config.github.account, "octocat");
        assert_eq!(config.github.token.expose(), "ghp_token");
        assert_eq!(config.llm.api_key.expose(), "gem-key");
        assert_eq!(config.secret.expose(), "s3cret");
    }

    #[test]
    fn test_missing_secret_is_reported_by_name() {
        let env: Vec<_> = required_env()
            .into_iter()
            .filter(|(k, _)| *k != "SECRET_KEY")
            .collect();
        let err = AppConfig::from_sources(None, env_from(&env)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "SECRET_KEY" }));
    }

    #[test]
    fn test_empty_env_value_does_not_override() {
        let mut env = required_env();
        env.push(("PAGESMITH_HOST", ""));
        let config = AppConfig::from_sources(None, env_from(&env)).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_file_then_env_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pagesmith.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
secret = "from-file"

[server]
port = 9100
mode = "sync"

[github]
account = "file-account"
token = "ghp_file"

[llm]
api_key = "file-key"

[liveness]
max_attempts = 40
"#
        )
        .unwrap();

        let config = AppConfig::from_sources(
            Some(&path),
            env_from(&[("SECRET_KEY", "from-env"), ("PAGESMITH_PORT", "9200")]),
        )
        .unwrap();
        assert_eq!(config.secret.expose(), "from-env");
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.server.mode, ExecutionMode::Sync);
        assert_eq!(config.github.account, "file-account");
        assert_eq!(config.liveness.max_attempts, 40);
        // Untouched sections keep their defaults
        assert_eq!(config.liveness.interval_ms, 3_000);
    }

    #[test]
    fn test_invalid_port_in_env() {
        let mut env = required_env();
        env.push(("PAGESMITH_PORT", "eighty"));
        let err = AppConfig::from_sources(None, env_from(&env)).unwrap_err();
        match err {
            ConfigError::Invalid { key, .. } => assert_eq!(key, "PAGESMITH_PORT"),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_mode_in_env() {
        let mut env = required_env();
        env.push(("PAGESMITH_MODE", "eventually"));
        let err = AppConfig::from_sources(None, env_from(&env)).unwrap_err();
        assert!(err.to_string().contains("PAGESMITH_MODE"));
    }

    #[test]
    fn test_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = AppConfig::from_sources(Some(&path), env_from(&required_env())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_sources(
            Some(Path::new("/nonexistent/pagesmith.toml")),
            env_from(&required_env()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::from_sources(None, env_from(&required_env())).unwrap();
        config.server.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_execution_mode_parse_and_display() {
        assert_eq!("sync".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sync);
        assert_eq!("DEFERRED".parse::<ExecutionMode>().unwrap(), ExecutionMode::Deferred);
        assert!("later".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::Sync.to_string(), "sync");
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, "\"***\"");
    }

    #[test]
    fn test_secret_matches() {
        let secret = Secret::new("hunter2");
        assert!(secret.matches(&Secret::new("hunter2")));
        assert!(!secret.matches(&Secret::new("hunter3")));
        assert!(!secret.matches(&Secret::new("")));
    }

    #[test]
    fn test_github_urls() {
        let settings = GitHubSettings {
            account: "octocat".to_string(),
            ..GitHubSettings::default()
        };
        assert_eq!(settings.repo_url("demo-42"), "https://github.com/octocat/demo-42");
        assert_eq!(
            settings.remote_url("demo-42"),
            "https://github.com/octocat/demo-42.git"
        );
        assert_eq!(
            settings.pages_url("demo-42"),
            "https://octocat.github.io/demo-42/"
        );
        assert_eq!(settings.author_email(), "octocat@users.noreply.github.com");
    }

    #[test]
    fn test_pages_url_override() {
        let settings = GitHubSettings {
            account: "octocat".to_string(),
            pages_url: Some("http://127.0.0.1:9000/sites/".to_string()),
            ..GitHubSettings::default()
        };
        assert_eq!(
            settings.pages_url("demo-42"),
            "http://127.0.0.1:9000/sites/demo-42/"
        );
    }

    #[test]
    fn test_config_serializes_without_secrets() {
        let config = AppConfig::from_sources(None, env_from(&required_env())).unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("ghp_token"));
        assert!(!rendered.contains("gem-key"));
        assert!(rendered.contains("octocat"));
    }
}
