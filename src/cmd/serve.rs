use std::path::Path;

use anyhow::{Context, Result};

use pagesmith::config::{AppConfig, ExecutionMode};
use pagesmith::server;

pub async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<&str>,
) -> Result<()> {
    let mut config = AppConfig::load(config_path).context("Failed to load configuration")?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(mode) = mode {
        config.server.mode = mode.parse::<ExecutionMode>()?;
    }
    super::check_token_format(&config);

    server::start_server(config).await
}
