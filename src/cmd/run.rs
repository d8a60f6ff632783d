//! One-shot pipeline run from a request file: `pagesmith run --request task.json`.

use std::path::Path;

use anyhow::{Context, Result};

use pagesmith::config::AppConfig;
use pagesmith::models::TaskRequest;
use pagesmith::pipeline::{Pipeline, PublishRunner};

pub async fn cmd_run(config_path: Option<&Path>, request_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request file {}", request_path.display()))?;
    let request: TaskRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request file {}", request_path.display()))?;

    let config = AppConfig::load(config_path).context("Failed to load configuration")?;
    super::check_token_format(&config);

    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
