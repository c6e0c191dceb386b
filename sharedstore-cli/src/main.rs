use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sharedstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use sharedstore_core::Config;
use std::path::PathBuf;
use tracing::info;

mod demo;

#[derive(Parser, Debug)]
#[command(name = "sharedstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an owner with workers and print every converged mirror
    Demo {
        /// Number of workers to spawn
        #[arg(short, long, default_value_t = 3)]
        workers: usize,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// Defaults, then the config file, then SHAREDSTORE_* variables, then flags
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;

    if let Some(level) = &args.log_level {
        if LogLevel::from_str(level).is_none() {
            bail!("invalid log level '{}'", level);
        }
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    sharedstore_core::metrics::init_metrics();
    info!("SharedStore CLI started");

    match args.command {
        Some(Command::Demo { workers }) => {
            let report = demo::run_demo(&config, workers).await?;
            print!("{}", report.render());
            if !report.converged() {
                bail!("mirrors did not converge");
            }
            info!(workers, "All mirrors converged");
        }
        Some(Command::Config) => {
            print!("{}", config.to_toml()?);
        }
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}
