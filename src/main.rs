//! CLI for linesub
//!
//! Subcommands:
//! - `server`: run the TCP broker with the operator console on stdin
//! - `client`: run the interactive terminal client

use clap::Parser;
use linesub::admin::{AdminConsole, run_console};
use linesub::broker::Broker;
use linesub::config::{Settings, load_config};
use linesub::transport::TcpServer;
use linesub::utils::error::BrokerError;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "linesub")]
enum Command {
    /// Start the broker and its operator console
    Server,
    /// Connect an interactive client to a running broker
    Client {
        /// Host to connect to (default: `server.host` from the configuration)
        #[arg(long)]
        host: Option<String>,
        /// Port to connect to (default: `server.port` from the configuration)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    linesub::utils::logging::init(&config.logging.level);

    let result = match cmd {
        Command::Server => run_server(config).await,
        Command::Client { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            linesub::terminal::run(&host, port).await
        }
    };

    if let Err(e) = result {
        error!("linesub failed: {}", e);
        std::process::exit(1);
    }
    // A pending stdin read would keep the runtime from shutting down.
    std::process::exit(0);
}

async fn run_server(config: Settings) -> Result<(), BrokerError> {
    let broker = Arc::new(Broker::new());
    let server = TcpServer::bind(&config, broker.clone()).await?;

    let console = AdminConsole::new(broker.clone(), &config.broker.export_dir);
    let console_task = tokio::spawn(run_console(console, broker.shutdown_token()));

    let signal_broker = broker.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Exiting gracefully.");
            // A signal overrides an open inspect session.
            let _ = signal_broker.end_inspect();
            let _ = signal_broker.shutdown();
        }
    });

    server.run().await?;
    console_task.abort();
    Ok(())
}
