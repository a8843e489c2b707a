// src/main.rs

use anyhow::{Context as _, Result};
use beacon::Config;
use beacon::commands::{self, Context};
use beacon::render::Renderer;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about = "CLI tool powered by Nix for package management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Package(PackageCommand),
    /// Start the REST API server
    #[cfg(feature = "server")]
    Server {
        /// Port to listen on (default: $PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind (default: $HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PackageCommand {
    /// Install a package with optional version
    Install {
        /// Package name
        package: String,
        /// Version to install (default: latest)
        version: Option<String>,
    },
    /// Remove installed packages
    Remove {
        /// Package names to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Search available packages
    Search {
        /// Search term (lists everything if omitted)
        term: Option<String>,
    },
    /// Update a package, following upgrade mappings
    Update {
        /// Package name
        package: String,
    },
    /// List all installed packages
    List,
    /// Login with your user address
    Login {
        /// Wallet address to publish under
        user_address: String,
    },
    /// Push all installed packages to the hub
    Push {
        /// Project name recorded with the snapshot
        project_name: String,
    },
    /// Pull and install a package list from a share URL
    Pull {
        /// URL whose last path segment is the blob id
        url: String,
    },
    /// Install all packages needed for a development environment
    Quickstart {
        /// Environment name (see `beacon environments`)
        environment: String,
    },
    /// List all available development environments
    Environments,
}

fn run(command: PackageCommand) -> beacon::Result<()> {
    let ctx = Context::from_config(Config::from_env()?)?;

    match command {
        PackageCommand::Install { package, version } => {
            info!("Installing package: {}", package);
            commands::install(&ctx, &package, version.as_deref())
        }
        PackageCommand::Remove { packages } => {
            info!("Removing packages: {}", packages.join(", "));
            commands::remove(&ctx, &packages)
        }
        PackageCommand::Search { term } => commands::search(&ctx, term.as_deref()),
        PackageCommand::Update { package } => {
            info!("Updating package: {}", package);
            commands::update(&ctx, &package)
        }
        PackageCommand::List => commands::list(&ctx),
        PackageCommand::Login { user_address } => commands::login(&ctx, &user_address),
        PackageCommand::Push { project_name } => commands::push(&ctx, &project_name),
        PackageCommand::Pull { url } => commands::pull(&ctx, &url),
        PackageCommand::Quickstart { environment } => commands::quickstart(&ctx, &environment),
        PackageCommand::Environments => commands::environments(&ctx),
    }
}

/// Setup errors fail the process; anything else is reported and the command completes
fn report(result: beacon::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_setup_error() => Err(e.into()),
        Err(e) => {
            Renderer::current().failure(&format!("Error: {}", e));
            debug!("Command failed: {:?}", e);
            Ok(())
        }
    }
}

#[cfg(feature = "server")]
fn run_server(port: Option<u16>, host: Option<String>) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(host) = host {
        config.host = host;
    }

    // Built outside the runtime: the blocking HTTP client must not be created
    // or dropped on an async thread.
    let state = beacon::server::AppState::from_config(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime
        .block_on(beacon::server::serve(state.clone(), &config.host, config.port))
        .context("Server failed")?;
    drop(runtime);
    drop(state);
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package(command) => report(run(command)),
        #[cfg(feature = "server")]
        Commands::Server { port, host } => run_server(port, host),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "beacon", &mut std::io::stdout());
            Ok(())
        }
    }
}
