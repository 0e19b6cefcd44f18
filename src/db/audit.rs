use crate::db::db_pool::DuckDBConnectionManager;
use duckdb::params;
use r2d2::Pool;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptStatus {
    Success,
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "SUCCESS",
            AttemptStatus::Error => "ERROR",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "SUCCESS" => AttemptStatus::Success,
            _ => AttemptStatus::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Correct,
    Incorrect,
    Partial,
}

impl Feedback {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CORRECT" => Some(Feedback::Correct),
            "INCORRECT" => Some(Feedback::Incorrect),
            "PARTIAL" => Some(Feedback::Partial),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Correct => "CORRECT",
            Feedback::Incorrect => "INCORRECT",
            Feedback::Partial => "PARTIAL",
        }
    }
}

/// One persisted query attempt, already in its terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAttempt {
    pub id: i64,
    pub username: String,
    pub user_query: String,
    pub generated_sql: Option<String>,
    pub executed_sql: Option<String>,
    pub status: AttemptStatus,
    pub result_count: Option<i64>,
    pub execution_time_ms: i64,
    pub error_message: Option<String>,
    pub query_time: String,
    pub feedback: Option<String>,
    pub feedback_comment: Option<String>,
}

/// Insert payload for one terminal attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub username: String,
    pub user_query: String,
    pub generated_sql: Option<String>,
    pub executed_sql: Option<String>,
    pub status: AttemptStatus,
    pub result_count: Option<i64>,
    pub execution_time_ms: i64,
    pub error_message: Option<String>,
    pub query_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub total_queries: i64,
    pub successful_queries: i64,
    pub failed_queries: i64,
    pub success_rate: String,
}

#[derive(Debug)]
pub enum AuditError {
    NotFound,
    NotOwner,
    Store(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::NotFound => write!(f, "Query record not found"),
            AuditError::NotOwner => write!(f, "No permission to operate this record"),
            AuditError::Store(msg) => write!(f, "Audit store error: {msg}"),
        }
    }
}

impl Error for AuditError {}

impl From<duckdb::Error> for AuditError {
    fn from(e: duckdb::Error) -> Self {
        AuditError::Store(e.to_string())
    }
}

impl From<r2d2::Error> for AuditError {
    fn from(e: r2d2::Error) -> Self {
        AuditError::Store(e.to_string())
    }
}

const SELECT_ATTEMPT: &str = "SELECT id, username, user_query, generated_sql, executed_sql, \
     status, result_count, execution_time_ms, error_message, query_time, \
     feedback, feedback_comment FROM ai_query_log";

/// Durable log of every query attempt. Attempts are written once, already
/// terminal; the only later mutation is the owner-scoped feedback update.
#[derive(Clone)]
pub struct AuditLog {
    pool: Pool<DuckDBConnectionManager>,
}

impl AuditLog {
    pub fn new(pool: Pool<DuckDBConnectionManager>) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), AuditError> {
        self.blocking(|conn| {
            conn.execute_batch(
                "CREATE SEQUENCE IF NOT EXISTS ai_query_log_id_seq;
                 CREATE TABLE IF NOT EXISTS ai_query_log (
                     id BIGINT PRIMARY KEY DEFAULT nextval('ai_query_log_id_seq'),
                     username VARCHAR NOT NULL,
                     user_query VARCHAR NOT NULL,
                     generated_sql VARCHAR,
                     executed_sql VARCHAR,
                     status VARCHAR NOT NULL,
                     result_count BIGINT,
                     execution_time_ms BIGINT NOT NULL,
                     error_message VARCHAR,
                     query_time VARCHAR NOT NULL,
                     feedback VARCHAR,
                     feedback_comment VARCHAR
                 );",
            )?;
            Ok(())
        })
        .await
    }

    /// Writes one terminal attempt and returns its assigned id.
    pub async fn record(&self, record: AttemptRecord) -> Result<i64, AuditError> {
        self.blocking(move |conn| {
            let id = conn.query_row(
                "INSERT INTO ai_query_log (username, user_query, generated_sql, \
                 executed_sql, status, result_count, execution_time_ms, \
                 error_message, query_time) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
                params![
                    record.username,
                    record.user_query,
                    record.generated_sql,
                    record.executed_sql,
                    record.status.as_str(),
                    record.result_count,
                    record.execution_time_ms,
                    record.error_message,
                    record.query_time,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    /// The user's most recent attempts, newest first.
    pub async fn recent_for_user(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<QueryAttempt>, AuditError> {
        let username = username.to_string();
        self.blocking(move |conn| {
            let sql = format!("{SELECT_ATTEMPT} WHERE username = ? ORDER BY query_time DESC, id DESC LIMIT {limit}");
            let mut stmt = conn.prepare(&sql)?;
            let attempts = stmt
                .query_map(params![username], row_to_attempt)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(attempts)
        })
        .await
    }

    /// Attaches feedback to an attempt. Fails unless `username` owns it.
    pub async fn set_feedback(
        &self,
        id: i64,
        username: &str,
        feedback: Feedback,
        comment: Option<String>,
    ) -> Result<(), AuditError> {
        let username = username.to_string();
        self.blocking(move |conn| {
            let owner: String = conn
                .query_row(
                    "SELECT username FROM ai_query_log WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(|e| match e {
                    duckdb::Error::QueryReturnedNoRows => AuditError::NotFound,
                    other => AuditError::Store(other.to_string()),
                })?;

            if owner != username {
                return Err(AuditError::NotOwner);
            }

            conn.execute(
                "UPDATE ai_query_log SET feedback = ?, feedback_comment = ? WHERE id = ?",
                params![feedback.as_str(), comment, id],
            )?;

            info!(
                "User {} provided feedback {} for query {}",
                username,
                feedback.as_str(),
                id
            );
            Ok(())
        })
        .await
    }

    /// Attempt counts and success rate for one user.
    pub async fn stats_for_user(&self, username: &str) -> Result<QueryStats, AuditError> {
        let username = username.to_string();
        self.blocking(move |conn| {
            let count = |status: &str| -> Result<i64, duckdb::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM ai_query_log WHERE username = ? AND status = ?",
                    params![username, status],
                    |row| row.get(0),
                )
            };

            let successful = count("SUCCESS")?;
            let failed = count("ERROR")?;
            let total = successful + failed;
            let success_rate = if total > 0 {
                successful as f64 / total as f64 * 100.0
            } else {
                0.0
            };

            Ok(QueryStats {
                total_queries: total,
                successful_queries: successful,
                failed_queries: failed,
                success_rate: format!("{success_rate:.1}%"),
            })
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, AuditError>
    where
        T: Send + 'static,
        F: FnOnce(&duckdb::Connection) -> Result<T, AuditError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| AuditError::Store(e.to_string()))?
    }
}

fn row_to_attempt(row: &duckdb::Row<'_>) -> Result<QueryAttempt, duckdb::Error> {
    let status: String = row.get(5)?;
    Ok(QueryAttempt {
        id: row.get(0)?,
        username: row.get(1)?,
        user_query: row.get(2)?,
        generated_sql: row.get(3)?,
        executed_sql: row.get(4)?,
        status: AttemptStatus::from_str(&status),
        result_count: row.get(6)?,
        execution_time_ms: row.get(7)?,
        error_message: row.get(8)?,
        query_time: row.get(9)?,
        feedback: row.get(10)?,
        feedback_comment: row.get(11)?,
    })
}
