use anyhow::Result;
use clap::Parser;
use odoo_mcp::config::PartialSettings;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Model Context Protocol server for Odoo
///
/// Exposes customers, products, sale orders and users from an Odoo
/// database as read-only tools for LLM clients.
#[derive(Parser, Debug)]
#[command(name = "odoo-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Odoo server URL (e.g. https://mycompany.odoo.com)
    #[arg(long, env = "ODOO_URL")]
    url: Option<String>,

    /// Odoo database name
    #[arg(long, env = "ODOO_DB")]
    db: Option<String>,

    /// Odoo login
    #[arg(long, env = "ODOO_USER")]
    user: Option<String>,

    /// Odoo password or API key
    #[arg(long, env = "ODOO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Request timeout in seconds (no timeout if unset)
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file (defaults to ./.odoo-mcp.toml, $ODOO_MCP_CONFIG or ~/.config/odoo-mcp/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> PartialSettings {
        PartialSettings {
            url: self.url.clone(),
            db: self.db.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout,
        }
    }
}

fn setup_logging(log_level: &str, log_file: Option<PathBuf>) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the protocol, so logs never go there
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        error!("Fatal error: {}", panic);
        eprintln!("Fatal error: {}", panic);
        std::process::exit(1);
    }));
}

/// Wait for SIGINT (or SIGTERM on unix)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads the environment
    dotenv::dotenv().ok();
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_file.clone())?;
    install_panic_hook();

    info!("Starting odoo-mcp v{}", env!("CARGO_PKG_VERSION"));

    let loader = match odoo_mcp::ConfigLoader::new(args.config.clone()) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(source) = loader.source() {
        info!("Loaded config file: {}", source.display());
    }

    let settings = match loader.resolve(args.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Connecting to: {}", settings.url);
    info!("Database: {}", settings.db);
    info!("User: {}", settings.username);

    let mut connector = match odoo_mcp::OdooConnector::new(settings) {
        Ok(connector) => connector,
        Err(e) => {
            error!("Failed to create Odoo connector: {}", e);
            eprintln!("Failed to create Odoo connector: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = connector.authenticate().await {
        error!("Error connecting to Odoo: {}", e);
        eprintln!("Error connecting to Odoo: {}", e);
        std::process::exit(1);
    }

    let source: Arc<dyn odoo_mcp::RecordSource> = Arc::new(connector);
    let mcp_server = odoo_mcp::McpServer::new(Some(source));

    info!("odoo-mcp server ready - accepting MCP requests on stdio");

    tokio::select! {
        result = mcp_server.run() => match result {
            Ok(()) => info!("MCP server stopped normally"),
            Err(e) => {
                error!("MCP server error: {:#}", e);
                eprintln!("MCP server error: {:#}", e);
                std::process::exit(1);
            }
        },
        _ = shutdown_signal() => {
            info!("Shutdown signal received. Goodbye!");
            eprintln!("Shutdown signal received. Goodbye!");
            // stdin is read on a blocking thread that would hold the runtime open
            std::process::exit(0);
        }
    }

    Ok(())
}
