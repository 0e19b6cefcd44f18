use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use tracing::{debug, error, info};

mod chart;
mod config;
mod db;
mod llm;
mod prompt;
mod query;
mod sql;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::audit::AuditLog;
use crate::db::db_pool::DuckDBConnectionManager;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Initializing DuckDB connection pool");
    let db_manager = DuckDBConnectionManager::new(config.database.connection_string.clone());
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(db_manager)?;

    // Make sure the audit table exists before serving requests
    info!("Initializing audit log");
    let audit = AuditLog::new(pool.clone());
    if let Err(e) = audit.init().await {
        error!("Failed to initialize audit log: {}", e);
        return Err(e.into());
    }

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    debug!(
        "LLM settings: model={}, timeout={}s, max_retries={}",
        config.llm.model, config.llm.timeout_secs, config.llm.max_retries
    );
    let llm_manager = LlmManager::new(&config.llm)?;

    // Create application state
    let app_state = Arc::new(AppState::new(config.clone(), pool, llm_manager));

    // Start the web server
    info!(
        "Starting NL-Query server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    Ok(())
}
