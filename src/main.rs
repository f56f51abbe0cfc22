use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use minidhcp::{Config, DhcpServer, Result};

#[derive(Parser)]
#[command(name = "minidhcp")]
#[command(author, version, about = "A minimal DHCPv4 server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve leases until interrupted (default)
    Run,
    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::load_or_create(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Loaded configuration from {:?}", cli.config);

            let server = DhcpServer::new(config).await?;

            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!(
                        "Shutting down with {} active lease(s)",
                        server.pool().active_lease_count().await
                    );
                    Ok(())
                }
            }
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!();
            println!("Pool size: {} addresses", config.pool_size());
            println!("Broadcast: {}", config.calculate_broadcast());
            Ok(())
        }
    }
}
