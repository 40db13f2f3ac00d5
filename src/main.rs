use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use route_watch::config::Config;
use route_watch::error::Error;
use route_watch::worker;

#[derive(Parser, Debug)]
#[command(name = "route-watch", version)]
#[command(about = "Monitors routes for traffic congestion and alerts when a faster alternative exists")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run a one-time congestion check
    Check {
        /// Path to the configuration file (TOML, YAML, or JSON)
        #[arg(short, long)]
        config_file: Option<PathBuf>,
        /// Name of the route to check (default: all routes)
        #[arg(short, long)]
        route: Option<String>,
        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Fetch and store the free-flow baseline waypoints for a route
    PopulateFreeFlow {
        /// Path to the configuration file (TOML, YAML, or JSON)
        #[arg(short, long)]
        config_file: Option<PathBuf>,
        /// Name of the route to populate
        #[arg(short, long)]
        route: String,
        /// Save the updated configuration back to the file
        #[arg(short, long)]
        save: bool,
    },
    /// Continuously monitor routes for congestion
    Watch {
        /// Path to the configuration file (TOML, YAML, or JSON)
        #[arg(short, long)]
        config_file: Option<PathBuf>,
        /// Specific route to watch (default: all routes)
        #[arg(short, long)]
        route: Option<String>,
        /// Check interval in seconds
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

impl Cli {
    fn verbose(&self) -> bool {
        match &self.command {
            CliCommand::Check { verbose, .. } | CliCommand::Watch { verbose, .. } => *verbose,
            CliCommand::PopulateFreeFlow { .. } => false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let default_filter = if cli.verbose() { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_filter));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        CliCommand::Check {
            config_file,
            route,
            verbose,
        } => {
            let path = Config::resolve_path(config_file)?;
            let config = Config::load(&path)?;
            worker::run_check(&config, route.as_deref(), verbose).await
        }
        CliCommand::PopulateFreeFlow {
            config_file,
            route,
            save,
        } => {
            let path = Config::resolve_path(config_file)?;
            let mut config = Config::load(&path)?;
            worker::run_populate(&mut config, &path, &route, save).await
        }
        CliCommand::Watch {
            config_file,
            route,
            interval,
            verbose,
        } => {
            let path = Config::resolve_path(config_file)?;
            let config = Config::load(&path)?;

            let token = CancellationToken::new();
            let signal_token = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            worker::run_watch(&config, route.as_deref(), interval, verbose, token).await
        }
    }
}
