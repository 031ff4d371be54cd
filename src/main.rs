use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, error};

use pipegate::config::GatewayConfig;
use pipegate::gateway::GatewayServer;
use pipegate::worker::Bridge;

/// Bridge HTTP requests to a stdio worker process
#[derive(Parser)]
#[command(name = "pipegate")]
#[command(about = "Gateway that runs one worker process per request", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short = 'c', long, default_value = "pipegate.toml")]
    config: PathBuf,

    /// Override the listen address from the configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,tower=debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("pipegate started with verbosity level: {}", cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = GatewayConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let command = config.worker_command()?;
    debug!("Worker command: {}", command.display());

    let bridge = Bridge::production(command, config.pump_limits());
    GatewayServer::new(bridge, config.listen).start().await
}
