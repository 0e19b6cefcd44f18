use crate::config::AppConfig;
use crate::db::audit::AuditLog;
use crate::db::db_pool::DuckDBConnectionManager;
use crate::llm::LlmManager;
use crate::query::QueryService;
use r2d2::Pool;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for the web server. The pipeline itself holds no
/// cross-request mutable state; everything here is read-only or internally
/// synchronized.
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: Pool<DuckDBConnectionManager>,
    pub audit: AuditLog,
    pub query_service: QueryService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: Pool<DuckDBConnectionManager>,
        llm_manager: LlmManager,
    ) -> Self {
        let audit = AuditLog::new(db_pool.clone());
        let query_service = QueryService::new(
            db_pool.clone(),
            Arc::new(llm_manager),
            audit.clone(),
            Duration::from_secs(config.database.query_timeout_secs),
        );

        Self {
            config,
            db_pool,
            audit,
            query_service,
        }
    }
}
