use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use placelog_cli::{create_example_config, Simulation};
use placelog_core::{ConfigError, PlacelogConfig};
use placelog_runner::logging::init_logging;

#[derive(Parser)]
#[command(name = "placelog", version, about = "Telemetry logging pipeline tools", long_about = None)]
pub struct Cli {
    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    /// Also write diagnostics to the placelog data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run simulated players against an in-memory store and report what was written
    Simulate(SimulateArgs),
    /// Write an example config file
    InitConfig {
        /// Where to write it (default: the placelog config directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SimulateArgs {
    /// Number of simulated sessions
    #[arg(short, long)]
    sessions: Option<u32>,

    /// How long to run, in seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Probability that a store write fails (0.0 - 1.0)
    #[arg(long)]
    fail_rate: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn default_config_path() -> Result<PathBuf, Box<dyn Error>> {
    PlacelogConfig::config_path().ok_or_else(|| "Failed to determine config directory".into())
}

fn load_config(args: &SimulateArgs) -> Result<PlacelogConfig, Box<dyn Error>> {
    let loaded = match &args.config {
        Some(path) => PlacelogConfig::load_from(path),
        None => PlacelogConfig::load(),
    };

    let mut config = match loaded {
        Ok(config) => config,
        // An explicitly named file has to exist
        Err(ConfigError::NotFound(path)) if args.config.is_none() => {
            info!(
                "No config at {}, using defaults (run `placelog init-config` to create one)",
                path.display()
            );
            PlacelogConfig::default()
        }
        Err(e) => return Err(format!("Failed to load config: {}", e).into()),
    };

    if let Some(sessions) = args.sessions {
        config.simulation.sessions = sessions;
    }
    if let Some(duration_secs) = args.duration_secs {
        config.simulation.duration_secs = duration_secs;
    }
    if let Some(fail_rate) = args.fail_rate {
        config.simulation.fail_rate = fail_rate;
    }
    config.validate()?;

    Ok(config)
}

async fn simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let mut simulation = Simulation::new(config);
    if let Some(seed) = args.seed {
        simulation = simulation.seeded(seed);
    }
    let report = simulation.run(shutdown_rx).await?;

    println!("{}", report);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_filter = match cli.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let component = match &cli.command {
        Command::Simulate(_) => "simulate",
        Command::InitConfig { .. } => "init-config",
    };
    let _guard = init_logging(component, cli.log_file, default_filter)?;

    match cli.command {
        Command::Simulate(args) => simulate(args).await,
        Command::InitConfig { path } => {
            let path = match path {
                Some(path) => path,
                None => default_config_path()?,
            };
            create_example_config(&path)?;
            eprintln!("Config file created at: {}", path.display());
            Ok(())
        }
    }
}
