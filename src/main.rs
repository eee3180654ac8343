//! askdb - Main entry point.
//!
//! Reads the environment (and `.env`), connects to the database and serves
//! the question page until interrupted.

use askdb::chain::SqlDatabaseChain;
use askdb::config::Config;
use askdb::db::{ConnectionDescriptor, DbPool};
use askdb::llm::{CompletionModel, OpenAiCompletion};
use askdb::web::HttpServer;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the variables may come from the shell
    if let Err(e) = askdb::config::load_dotenv() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        eprintln!();
        eprintln!("Required environment variables (or a .env file):");
        eprintln!("  OPENAI_API_KEY   API key for the completion model");
        eprintln!("  user, pass       database credentials");
        eprintln!("  host, dbase      database server and name (port 5432)");
        eprintln!();
        eprintln!("Alternatively set DATABASE_URL, e.g. sqlite:data.db");
        std::process::exit(1);
    }

    info!(
        model = %config.model,
        "Starting askdb v{}",
        env!("CARGO_PKG_VERSION")
    );

    let descriptor = ConnectionDescriptor::from_config(&config)?;
    let pool = DbPool::connect(&descriptor, !config.allow_writes).await?;

    let model: Arc<dyn CompletionModel> = Arc::new(OpenAiCompletion::from_config(&config)?);
    let chain = SqlDatabaseChain::from_config(&config, model, pool.clone());

    info!(
        addr = %config.http_bind_addr(),
        allow_writes = config.allow_writes,
        return_direct = config.return_direct,
        "Serving query page"
    );
    let server = HttpServer::new(Arc::new(chain), pool, &config.http_host, config.http_port);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
