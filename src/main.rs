use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(version, about = "Generate single-page sites from briefs and publish them to GitHub Pages")]
pub struct Cli {
    /// Debug-level logging for pagesmith and the HTTP layer
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to ./pagesmith.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Execution mode: sync or deferred
        #[arg(long)]
        mode: Option<String>,
    },
    /// Run the pipeline once for a request file and print the result
    Run {
        /// JSON task request
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default = if verbose {
        "pagesmith=debug,tower_http=debug"
    } else {
        "pagesmith=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port, mode } => {
            cmd::cmd_serve(config, host, port, mode.as_deref()).await?
        }
        Commands::Run { request } => cmd::cmd_run(config, &request).await?,
        Commands::Config => cmd::cmd_config(config)?,
    }
    Ok(())
}
