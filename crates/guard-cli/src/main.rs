//! inspect-guard CLI - replay sessions against the inspection monitor

mod scenario;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use guard_monitor::{Delivery, GuardConfig};
use tracing_subscriber::EnvFilter;

use crate::scenario::{Script, Simulation};

#[derive(Parser)]
#[command(name = "inspect-guard")]
#[command(about = "Inspection-deterrence monitor - simulation and config tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Replay a scripted session against a simulated page
    Simulate {
        /// Session script (JSON)
        #[arg(short, long)]
        script: PathBuf,
        /// Monitor configuration file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the report delivery strategy
        #[arg(long, value_enum)]
        delivery: Option<DeliveryArg>,
    },
    /// Validate a configuration file and print the effective settings
    Check {
        /// Monitor configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DeliveryArg {
    Beacon,
    Request,
}

impl From<DeliveryArg> for Delivery {
    fn from(arg: DeliveryArg) -> Self {
        match arg {
            DeliveryArg::Beacon => Delivery::Beacon,
            DeliveryArg::Request => Delivery::Request,
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GuardConfig> {
    let config = match path {
        Some(path) => GuardConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GuardConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate().context("validating config after environment overrides")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            script,
            config,
            delivery,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(delivery) = delivery {
                config.reporter.delivery = delivery.into();
            }
            let raw = std::fs::read_to_string(&script)
                .with_context(|| format!("reading script {}", script.display()))?;
            let script: Script = serde_json::from_str(&raw).context("parsing session script")?;

            let summary = Simulation::new(config)?.run(&script).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Check { config } => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("Violation endpoint: {}", config.reporter.endpoint());
            if config.is_disabled() {
                println!("Monitor status: DISABLED (development override)");
            } else {
                println!("Monitor status: READY");
            }
        }
    }

    Ok(())
}
