use anyhow::{bail, Context, Result};
use arca_node::{logging, NodeConfig, Script};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "arca")]
#[command(about = "Arca storage market runner", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Environment file read before overrides (defaults to ./.env)
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON script against an in-memory market
    Run {
        /// Script file
        #[arg(short, long)]
        script: PathBuf,

        /// Include emitted events in the printed report
        #[arg(long)]
        events: bool,
    },

    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = "arca.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (file, then environment)
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file = NodeConfig::load_env_file(cli.env_file.as_deref())?;

    // Priority: environment (.env included) > config file > defaults
    let mut config = NodeConfig::load(cli.config.as_deref())?;
    config.apply_env_overrides()?;
    config.validate()?;

    logging::init_logging(&config.logging, cli.verbose).context("initializing logging")?;
    if let Some(path) = env_file {
        debug!(path = ?path, "Loaded environment file");
    }

    match cli.command {
        Commands::Run { script, events } => {
            info!(script = ?script, node = %config.node.name, "🚀 Loading script");
            let script = Script::from_file(&script)?;
            let mut report = script.run(&config).await?;
            if !events {
                report.events.clear();
            }
            println!("{}", serde_json::to_string_pretty(&report)?);

            let unexpected = report.unexpected();
            if unexpected > 0 {
                warn!(unexpected, "❌ Script diverged from expectations");
                bail!("{unexpected} step(s) did not go as expected");
            }
            Ok(())
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                bail!("{} already exists (use --force)", output.display());
            }
            NodeConfig::default().save_to_file(&output)?;
            info!(output = ?output, "✨ Wrote default configuration");
            Ok(())
        }

        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
