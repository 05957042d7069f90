// Main binary that starts the server
use std::fs;
use std::io::stderr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use damselfly_dhcp6::{compile_pipeline, Duid, Server, ServerConfig};

// Define the command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Damselfly DHCPv6 Server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// Define the subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the DHCPv6 server.
    Serve(ServeArgs),
    /// Compiles the configuration and reports errors without serving.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Path to the JSON server configuration
    #[arg(short, long, default_value = "damselfly.json")]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Path to the JSON server configuration
    #[arg(short, long, default_value = "damselfly.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?; // Install better error handling

    let cli = Cli::parse();

    // Respect RUST_LOG, fallback to verbose/info for our crates
    let default_level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "damselfly={level},damselfly_dhcp6={level}",
        level = default_level
    );
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    registry()
        .with(filter)
        .with(fmt::layer().with_writer(stderr))
        .init();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Check(args) => check(args),
    }
}

/// Load the configuration and serve until Ctrl+C
async fn serve(args: ServeArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let server = Server::new(config).wrap_err("failed to start server")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Ctrl+C received, shutting down...");
        let _ = shutdown_tx.send(true);
    });

    println!("Starting Damselfly DHCPv6 server - press Ctrl+C to stop");
    server
        .run(shutdown_rx)
        .await
        .wrap_err("server exited with an error")?;
    Ok(())
}

/// Compile the configuration without serving, for operator validation
fn check(args: CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    if let Err(e) = config.server_id.parse::<Duid>() {
        error!(error = %e, "configuration rejected");
        eprintln!("Configuration error: invalid server_id: {e}");
        std::process::exit(1);
    }

    match compile_pipeline(&config.pipeline) {
        Ok(pipeline) => {
            println!(
                "Configuration OK: {} listener(s), {} root pipeline section(s)",
                config.listeners.len(),
                pipeline.nodes().len()
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "configuration rejected");
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    }
}

fn load_config(path: &Path) -> Result<ServerConfig> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read configuration file {}", path.display()))?;
    serde_json::from_str(&text)
        .wrap_err_with(|| format!("failed to parse configuration file {}", path.display()))
}
