use binner::auth::TokenStore;
use binner::cli::{self, AppConfig};
use binner::digikey::DigikeyApi;
use binner::pid::{self, PidFile};
use binner::server::{self, AppState};
use binner::storage::{Db, PartTypeRepository};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "binner")]
#[command(about = "Binner - parts inventory with DigiKey lookups", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults to ~/.binner/config.toml)
    #[arg(short, long, env = "BINNER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the inventory server
    Start {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Stop the inventory server
    Stop,
    /// Restart the inventory server in the background
    Restart,
    /// Check service status
    Status,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Look up a part number on DigiKey and print the metadata
    Lookup {
        part_number: String,
    },
    /// Forget the saved DigiKey credentials
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("binner=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::from_file(&config_path)?;
    let pid_file = PidFile::in_dir(&cli::data_dir()?);

    match cli.command {
        Commands::Start { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }

            if let Some(pid) = pid_file.running_pid() {
                anyhow::bail!("Binner is already running (PID: {})", pid);
            }
            if let Err(e) = pid_file.write() {
                eprintln!("Warning: Failed to write PID file: {}", e);
            }

            tracing::info!("Starting Binner on port {}", config.server.port);
            println!("📦 Binner v{}", env!("CARGO_PKG_VERSION"));
            println!("📡 Open http://{}:{}/", config.server.host, config.server.port);
            if !config.digikey.is_configured() {
                println!("ℹ️  Set digikey.client_id and digikey.client_secret in {} to enable part lookups", config_path.display());
            }
            println!();
            println!("Press Ctrl+C to stop");

            let result = tokio::select! {
                result = server::start_server(config) => result,
                _ = tokio::signal::ctrl_c() => {
                    println!("Shutting down...");
                    Ok(())
                }
            };
            let _ = pid_file.cleanup();
            result?;
        }
        Commands::Stop => {
            println!("Stopping Binner...");
            match pid_file.running_pid() {
                Some(pid) => match pid::stop_process(pid) {
                    Ok(()) => {
                        println!("✅ Service stopped successfully");
                        let _ = pid_file.cleanup();
                    }
                    Err(e) => eprintln!("Failed to stop service: {}", e),
                },
                None => println!("Service is not running"),
            }
        }
        Commands::Restart => {
            println!("Restarting Binner...");
            if let Some(pid) = pid_file.running_pid() {
                println!("Stopping existing service...");
                if let Err(e) = pid::stop_process(pid) {
                    eprintln!("Failed to stop service: {}", e);
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            }
            let _ = pid_file.cleanup();

            println!("Starting service...");
            use std::process::Command;

            let exe_path = std::env::current_exe()?;
            let mut cmd = Command::new(&exe_path);
            cmd.arg("--config").arg(&config_path).arg("start");

            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }

            cmd.stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());

            match cmd.spawn() {
                Ok(_) => {
                    tokio::time::sleep(tokio::time::Duration::from_millis(1000)).await;
                    println!("✅ Service restarted successfully");
                }
                Err(e) => eprintln!("Failed to restart service: {}", e),
            }
        }
        Commands::Status => {
            println!("Checking service status...");
            match pid_file.running_pid() {
                Some(pid) => println!("✅ Service is running (PID: {})", pid),
                None => println!("❌ Service is not running"),
            }
        }
        Commands::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, AppConfig::default().to_toml()?)?;
            println!("✅ Configuration written to {}", config_path.display());
            println!("📝 Add your DigiKey client_id and client_secret under [digikey]");
        }
        Commands::Lookup { part_number } => {
            lookup(config, &part_number).await?;
        }
        Commands::Logout => {
            let token_store = TokenStore::new(config.digikey.token_file_path()?)?;
            let token_path = token_store.path().to_path_buf();
            let digikey = DigikeyApi::new(config.digikey.clone(), token_store)?;
            digikey.forget_authentication_tokens()?;
            println!("🔓 DigiKey credentials removed from {}", token_path.display());
        }
    }

    Ok(())
}

/// One-shot metadata lookup; serves the OAuth redirect itself while it waits
async fn lookup(config: AppConfig, part_number: &str) -> anyhow::Result<()> {
    let db = Db::open(&config.storage.database_path()?, config.storage.pool_size)?;
    let part_types: Vec<String> = PartTypeRepository::new(db.clone())
        .list()?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let token_store = TokenStore::new(config.digikey.token_file_path()?)?;
    let digikey = Arc::new(DigikeyApi::new(config.digikey.clone(), token_store)?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, db, digikey.clone(), digikey));
    let callback_server = match TcpListener::bind(&addr).await {
        Ok(listener) => {
            let app = server::build_router(state.clone());
            Some(tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            }))
        }
        Err(e) => {
            tracing::warn!(
                "⚠️  Could not listen on {} ({}); if Binner is running, use its /part/metadata instead",
                addr,
                e
            );
            None
        }
    };

    let result = state
        .metadata
        .lookup_part_metadata(part_number, &part_types)
        .await;
    if let Some(handle) = callback_server {
        handle.abort();
    }

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
