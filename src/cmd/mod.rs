//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `run`    | `Run`            |
//! | `config` | `Config`         |

pub mod config;
pub mod run;
pub mod serve;

pub use config::cmd_config;
pub use run::cmd_run;
pub use serve::cmd_serve;

use pagesmith::config::AppConfig;
use pagesmith::publish::github::is_valid_github_token;

/// Warn early about a token GitHub will certainly reject.
fn check_token_format(config: &AppConfig) {
    if !is_valid_github_token(config.github.token.expose()) {
        tracing::warn!(
            "GITHUB_TOKEN does not look like a GitHub token (expected a ghp_, github_pat_, gho_, ghu_, ghs_ or ghr_ prefix)"
        );
    }
}
