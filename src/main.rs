//! Zonewarden daemon
//!
//! # Usage
//!
//! ```bash
//! # Serve the public API and both control sockets
//! zonewarden
//! zonewarden --config /etc/zonewarden.json serve
//!
//! # One-shot commands
//! zonewarden zones              # Print the zone store
//! zonewarden map lan_access     # Print decoded verdict map elements
//! zonewarden reload-psk         # Regenerate credential files and reload hostapd
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zonewarden::config;
use zonewarden::core::verdict_map::VerdictMapClient;
use zonewarden::daemon::{self, Services};
use zonewarden::tools::{SystemRunner, ToolRunner};
use zonewarden::validators;

#[derive(Parser)]
#[command(name = "zonewarden")]
#[command(about = "Zone firewall and WiFi PSK control plane", long_about = None)]
struct Cli {
    /// Configuration file (default: /state/api/config.json)
    #[arg(short, long, env = "ZONEWARDEN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default)
    Serve,
    /// Print the zone store
    Zones,
    /// Print the decoded elements of a verdict map
    Map {
        /// Name of the map, e.g. lan_access
        name: String,
    },
    /// Regenerate credential files and reload the authenticator
    ReloadPsk,
}

fn init_logging(log_file: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(file)
                    .init();
                return;
            }
            Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
        }
    }

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let path = config::resolve_config_path(cli.config.as_deref());
    let config = config::load_config(&path).await?;

    if !nix::unistd::getuid().is_root() {
        tracing::warn!("Not running as root; nft, ip and arp calls will likely fail");
    }

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => daemon::serve(config, runner).await?,
        Commands::Zones => {
            let services = Services::build(&config, runner);
            let zones = services.zones.get_all().await?;
            println!("{}", serde_json::to_string_pretty(&zones)?);
        }
        Commands::Map { name } => {
            let name = validators::validate_map_name(&name)?;
            let maps = VerdictMapClient::new(runner, config.tools.nft.clone());
            for entry in maps.list_elements(&name).await {
                println!("{}", entry.key_fields().join(" . "));
            }
        }
        Commands::ReloadPsk => {
            let services = Services::build(&config, runner);
            services.psk.reload_credentials().await?;
            println!("✓ Credential files regenerated and authenticator reloaded.");
        }
    }
    Ok(())
}
