use crate::db::db_pool::DuckDBConnectionManager;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as DbValue};
use r2d2::Pool;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

/// One result row: column name to value, in the store's column order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug)]
pub struct ExecutionError(pub String);

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query execution failed: {}", self.0)
    }
}

impl Error for ExecutionError {}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Runs a validated, bound SELECT against the store and materializes every
/// row. The call is bounded by `timeout`; on expiry the attempt fails closed.
pub async fn run_query(
    pool: &Pool<DuckDBConnectionManager>,
    sql: &str,
    timeout: Duration,
) -> Result<QueryResult, ExecutionError> {
    let pool = pool.clone();
    let sql = sql.to_string();

    let task = tokio::task::spawn_blocking(move || -> Result<QueryResult, ExecutionError> {
        let conn = pool
            .get()
            .map_err(|e| ExecutionError(format!("Database connection error: {e}")))?;

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ExecutionError(e.to_string()))?;

        let column_count = stmt.column_count();
        let mut columns = Vec::with_capacity(column_count);
        for i in 0..column_count {
            match stmt.column_name(i) {
                Ok(name) => columns.push(name.to_string()),
                Err(e) => return Err(ExecutionError(e.to_string())),
            }
        }

        let mut rows_out = Vec::new();
        let mut rows = stmt
            .query([])
            .map_err(|e| ExecutionError(e.to_string()))?;

        while let Some(row) = rows.next().map_err(|e| ExecutionError(e.to_string()))? {
            let mut out = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value: DbValue = row
                    .get(i)
                    .map_err(|e| ExecutionError(e.to_string()))?;
                out.insert(column.clone(), json_value(value));
            }
            rows_out.push(out);
        }

        debug!("Query returned {} rows", rows_out.len());
        Ok(QueryResult {
            columns,
            rows: rows_out,
        })
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            error!("Query task join error: {}", join_err);
            Err(ExecutionError(join_err.to_string()))
        }
        Err(_) => Err(ExecutionError(format!(
            "query timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Converts a DuckDB value into JSON. Exotic types degrade to strings rather
/// than failing the whole result set.
fn json_value(value: DbValue) -> Value {
    match value {
        DbValue::Null => Value::Null,
        DbValue::Boolean(b) => Value::Bool(b),
        DbValue::TinyInt(i) => Value::from(i),
        DbValue::SmallInt(i) => Value::from(i),
        DbValue::Int(i) => Value::from(i),
        DbValue::BigInt(i) => Value::from(i),
        DbValue::HugeInt(i) => Value::String(i.to_string()),
        DbValue::UTinyInt(i) => Value::from(i),
        DbValue::USmallInt(i) => Value::from(i),
        DbValue::UInt(i) => Value::from(i),
        DbValue::UBigInt(i) => Value::from(i),
        DbValue::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DbValue::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        DbValue::Decimal(d) => Value::String(d.to_string()),
        DbValue::Text(s) => Value::String(s),
        DbValue::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
        DbValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(719_163 + days)
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        DbValue::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null)
        }
        DbValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| Value::String(dt.naive_utc().to_string()))
            .unwrap_or(Value::Null),
        DbValue::Enum(s) => Value::String(s),
        DbValue::List(values) => Value::Array(values.into_iter().map(json_value).collect()),
        other => Value::String(format!("{other:?}")),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> Pool<DuckDBConnectionManager> {
        let manager = DuckDBConnectionManager::new(":memory:".to_string());
        Pool::builder().max_size(1).build(manager).unwrap()
    }

    #[tokio::test]
    async fn materializes_rows_in_column_order() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE users (id BIGINT, username VARCHAR, status VARCHAR);
                 INSERT INTO users VALUES (1, 'alice', 'active'), (2, 'bob', NULL);",
            )
            .unwrap();
        }

        let result = run_query(
            &pool,
            "SELECT * FROM \"users\" ORDER BY id LIMIT 1000",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(result.columns, vec!["id", "username", "status"]);
        assert_eq!(result.rows.len(), 2);

        let first: Vec<&String> = result.rows[0].keys().collect();
        assert_eq!(first, vec!["id", "username", "status"]);
        assert_eq!(result.rows[0]["username"], Value::String("alice".into()));
        assert_eq!(result.rows[1]["status"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_relation_is_an_execution_error() {
        let pool = test_pool();
        let err = run_query(&pool, "SELECT * FROM missing", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Query execution failed:"));
    }

    #[tokio::test]
    async fn slow_query_times_out_and_fails_closed() {
        let pool = test_pool();

        // Heavy enough that the blocking task cannot finish before the bound
        let err = run_query(
            &pool,
            "SELECT sum(t1.range * t2.range) FROM range(5000) t1, range(5000) t2",
            Duration::from_millis(1),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }
}
