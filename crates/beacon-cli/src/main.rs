//! Beacon daemon entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beacon_channel::{BeaconConfig, HttpDaemon};

#[derive(Parser)]
#[command(name = "beacon", about = "Multi-protocol command-processing daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "beacon.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Log errors only.
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP daemon.
    Daemon,
    /// Validate the configuration and print the sanity verdict.
    Check,
    /// Print a default configuration template.
    GenConfig,
}

fn load_config(path: &PathBuf) -> anyhow::Result<BeaconConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration at {}", path.display()))?;
    BeaconConfig::from_toml(&content).context("cannot parse configuration")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Daemon => {
            let config = load_config(&cli.config)?;
            let processor = config
                .build_processor()
                .context("cannot build the command processor")?;
            let daemon = HttpDaemon::new(config.http.clone(), Arc::new(processor));
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("cannot build the async runtime")?
                .block_on(daemon.start_and_block())
                .context("HTTP daemon failed")?;
            Ok(())
        }
        Commands::Check => {
            let config = load_config(&cli.config)?;
            let processor = config
                .build_processor()
                .context("cannot build the command processor")?;
            if processor.is_empty() {
                println!("processor is empty: no PIN configured, fronts will not serve commands");
                return Ok(());
            }
            let errs = processor.is_sane_for_internet();
            if errs.is_empty() {
                println!("configuration is sane for the Internet");
                Ok(())
            } else {
                for err in &errs {
                    eprintln!("{err}");
                }
                anyhow::bail!("{} configuration problem(s)", errs.len());
            }
        }
        Commands::GenConfig => {
            let template = BeaconConfig::default()
                .to_toml()
                .context("cannot render the configuration template")?;
            println!("{template}");
            Ok(())
        }
    }
}
