//! Effective configuration view: `pagesmith config`.

use std::path::Path;

use anyhow::{Context, Result};

use pagesmith::config::AppConfig;

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::resolve(config_path).context("Failed to load configuration")?;

    // Secret fields serialize as "***"
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered.trim_end());
    println!();

    match config.validate() {
        Ok(()) => println!("Configuration is valid."),
        Err(e) => println!("Configuration is incomplete: {}", e),
    }
    Ok(())
}
