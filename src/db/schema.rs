use crate::db::db_pool::DuckDBConnectionManager;
use duckdb::Connection;
use r2d2::Pool;
use tracing::error;

/// Returns a textual description of every base table in the main schema,
/// suitable for inclusion in an LLM prompt. Views and internal catalog
/// objects are excluded; tables and columns appear in catalog order.
///
/// Never fails: a catalog read error is rendered into the returned text so a
/// schema problem cannot block an otherwise-servable request.
pub async fn describe_schema(pool: &Pool<DuckDBConnectionManager>) -> String {
    let pool = pool.clone();

    let result = tokio::task::spawn_blocking(
        move || -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            let conn = pool.get()?;
            Ok(render_schema(&conn)?)
        },
    )
    .await;

    match result {
        Ok(Ok(schema)) => schema,
        Ok(Err(e)) => {
            error!("Error getting database schema: {}", e);
            format!("Database Schema Information:\n\nUnable to retrieve database schema: {e}\n")
        }
        Err(e) => {
            error!("Schema introspection task failed: {}", e);
            format!("Database Schema Information:\n\nUnable to retrieve database schema: {e}\n")
        }
    }
}

fn render_schema(conn: &Connection) -> Result<String, duckdb::Error> {
    let mut schema = String::from("Database Schema Information:\n\n");

    let mut tables_stmt = conn.prepare(
        "SELECT table_name, COALESCE(comment, '') \
         FROM duckdb_tables() \
         WHERE database_name = current_database() AND schema_name = 'main' \
         ORDER BY table_name",
    )?;
    let tables: Vec<(String, String)> = tables_stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(Result::ok)
        .collect();

    for (table_name, table_comment) in &tables {
        schema.push_str(&format!("Table: {table_name}\n"));
        if !table_comment.trim().is_empty() {
            schema.push_str(&format!("Purpose: {table_comment}\n"));
        }

        let mut cols_stmt = conn.prepare(
            "SELECT column_name, data_type, is_nullable, COALESCE(comment, '') \
             FROM duckdb_columns() \
             WHERE database_name = current_database() AND schema_name = 'main' \
             AND table_name = ? \
             ORDER BY column_index",
        )?;
        let columns: Vec<(String, String, bool, String)> = cols_stmt
            .query_map([table_name.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .filter_map(Result::ok)
            .collect();

        schema.push_str("Columns:\n");
        for (column_name, data_type, is_nullable, column_comment) in &columns {
            schema.push_str(&format!("  - {column_name} ({data_type})"));
            if !is_nullable {
                schema.push_str(" [Required]");
            }
            if !column_comment.trim().is_empty() {
                schema.push_str(&format!(" - {column_comment}"));
            }
            schema.push('\n');
        }
        schema.push('\n');
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> Pool<DuckDBConnectionManager> {
        let manager = DuckDBConnectionManager::new(":memory:".to_string());
        Pool::builder().max_size(1).build(manager).unwrap()
    }

    #[tokio::test]
    async fn describes_tables_and_columns_in_order() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE users (id BIGINT NOT NULL, username VARCHAR, status VARCHAR);
                 COMMENT ON TABLE users IS 'Registered users';
                 COMMENT ON COLUMN users.id IS 'primary key';",
            )
            .unwrap();
        }

        let schema = describe_schema(&pool).await;

        assert!(schema.starts_with("Database Schema Information:"));
        assert!(schema.contains("Table: users"));
        assert!(schema.contains("Purpose: Registered users"));
        assert!(schema.contains("  - id (BIGINT) [Required] - primary key"));

        // Declared column order is preserved
        let id_pos = schema.find("- id ").unwrap();
        let username_pos = schema.find("- username ").unwrap();
        let status_pos = schema.find("- status ").unwrap();
        assert!(id_pos < username_pos && username_pos < status_pos);
    }

    #[tokio::test]
    async fn catalog_error_is_rendered_into_the_text() {
        // A store that cannot be opened: the pool hands out no connections,
        // and the description degrades instead of failing the attempt
        let manager =
            DuckDBConnectionManager::new("/nonexistent-dir/nl-query.duckdb".to_string());
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(std::time::Duration::from_millis(100))
            .build_unchecked(manager);

        let schema = describe_schema(&pool).await;

        assert!(schema.starts_with("Database Schema Information:"));
        assert!(schema.contains("Unable to retrieve database schema:"));
    }

    #[tokio::test]
    async fn excludes_views() {
        let pool = test_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE orders (id BIGINT);
                 CREATE VIEW order_view AS SELECT * FROM orders;",
            )
            .unwrap();
        }

        let schema = describe_schema(&pool).await;
        assert!(schema.contains("Table: orders"));
        assert!(!schema.contains("order_view"));
    }
}
