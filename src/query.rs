use crate::chart::derive_chart_data;
use crate::db::audit::{AttemptRecord, AttemptStatus, AuditLog};
use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::executor::{run_query, ExecutionError, QueryResult, Row};
use crate::db::schema::describe_schema;
use crate::llm::{LlmError, LlmManager};
use crate::prompt::{build_prompt, query_examples};
use crate::sql::extract::extract_sql;
use crate::sql::limit::{enforce_limit, MAX_ROWS};
use crate::sql::validate::{validate_sql, ValidationError};
use chrono::Utc;
use r2d2::Pool;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_need_chart")]
    pub need_chart: bool,
    /// Advisory only; the enforced cap is the fixed LIMIT 1000.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_need_chart() -> bool {
    true
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub columns: Vec<String>,
    pub table_data: Vec<Row>,
    pub chart_data: Vec<Row>,
    pub result_count: usize,
    pub execution_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug)]
pub enum PipelineError {
    Completion(LlmError),
    Extraction,
    Validation(ValidationError),
    Execution(ExecutionError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Completion(e) => write!(f, "{e}"),
            PipelineError::Extraction => {
                write!(f, "Unable to extract valid SQL statement from AI response")
            }
            PipelineError::Validation(e) => write!(f, "{e}"),
            PipelineError::Execution(e) => write!(f, "{e}"),
        }
    }
}

impl Error for PipelineError {}

/// Sequences the attempt lifecycle: schema + examples → prompt → completion →
/// extraction → validation → bound enforcement → execution → chart
/// derivation. Strictly linear; the first error fails the attempt closed.
/// Every terminal outcome, success or failure, writes exactly one audit
/// record before the caller sees the result.
pub struct QueryService {
    pool: Pool<DuckDBConnectionManager>,
    llm: Arc<LlmManager>,
    audit: AuditLog,
    query_timeout: Duration,
}

impl QueryService {
    pub fn new(
        pool: Pool<DuckDBConnectionManager>,
        llm: Arc<LlmManager>,
        audit: AuditLog,
        query_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            llm,
            audit,
            query_timeout,
        }
    }

    pub async fn process(&self, username: &str, request: &QueryRequest) -> QueryResponse {
        let started = Instant::now();
        let query_time = Utc::now().to_rfc3339();

        if request.limit != default_limit() {
            debug!(
                "Advisory limit {} ignored; enforced cap is LIMIT {}",
                request.limit, MAX_ROWS
            );
        }

        let mut generated_sql: Option<String> = None;
        let mut executed_sql: Option<String> = None;

        let outcome = self
            .run_pipeline(request, &mut generated_sql, &mut executed_sql)
            .await;

        let execution_time_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(result) => {
                let chart_data = if request.need_chart {
                    derive_chart_data(&result.rows, &request.query)
                } else {
                    Vec::new()
                };

                info!(
                    "Query for '{}' succeeded: {} rows in {}ms",
                    username,
                    result.rows.len(),
                    execution_time_ms
                );

                self.write_audit(AttemptRecord {
                    username: username.to_string(),
                    user_query: request.query.clone(),
                    generated_sql,
                    executed_sql: executed_sql.clone(),
                    status: AttemptStatus::Success,
                    result_count: Some(result.rows.len() as i64),
                    execution_time_ms,
                    error_message: None,
                    query_time,
                })
                .await;

                QueryResponse {
                    success: true,
                    query: request.query.clone(),
                    sql: executed_sql,
                    result_count: result.rows.len(),
                    columns: result.columns,
                    chart_data,
                    table_data: result.rows,
                    execution_time: execution_time_ms,
                    error_message: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!("AI query failed for '{}': {}", username, message);

                self.write_audit(AttemptRecord {
                    username: username.to_string(),
                    user_query: request.query.clone(),
                    generated_sql,
                    executed_sql,
                    status: AttemptStatus::Error,
                    result_count: None,
                    execution_time_ms,
                    error_message: Some(message.clone()),
                    query_time,
                })
                .await;

                QueryResponse {
                    success: false,
                    query: request.query.clone(),
                    sql: None,
                    columns: Vec::new(),
                    table_data: Vec::new(),
                    chart_data: Vec::new(),
                    result_count: 0,
                    execution_time: execution_time_ms,
                    error_message: Some(message),
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &QueryRequest,
        generated_sql: &mut Option<String>,
        executed_sql: &mut Option<String>,
    ) -> Result<QueryResult, PipelineError> {
        // Schema retrieval never fails the attempt: a catalog error becomes
        // an explanatory line inside the prompt text
        let schema = describe_schema(&self.pool).await;
        let prompt = build_prompt(&schema, query_examples(), &request.query);

        let raw = self
            .llm
            .generate(&prompt)
            .await
            .map_err(PipelineError::Completion)?;
        debug!("Raw model output: {}", raw);

        let candidate = extract_sql(&raw).ok_or(PipelineError::Extraction)?;
        *generated_sql = Some(candidate.clone());
        info!("Generated SQL for '{}': {}", request.query, candidate);

        let mut statement = validate_sql(&candidate).map_err(PipelineError::Validation)?;
        enforce_limit(&mut statement, MAX_ROWS);
        let bound_sql = statement.to_string();
        *executed_sql = Some(bound_sql.clone());
        info!("Executing SQL: {}", bound_sql);

        run_query(&self.pool, &bound_sql, self.query_timeout)
            .await
            .map_err(PipelineError::Execution)
    }

    async fn write_audit(&self, record: AttemptRecord) {
        if let Err(e) = self.audit.record(record).await {
            // The attempt outcome stands; losing the audit row is logged loudly
            error!("Failed to write audit record: {}", e);
        }
    }
}
