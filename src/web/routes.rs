use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Query pipeline
            .route("/query", post(handlers::api::ai_query))
            // Prompt inputs
            .route("/schema", get(handlers::api::get_schema))
            .route("/examples", get(handlers::api::get_examples))
            // Audit trail
            .route("/history", get(handlers::api::get_history))
            .route("/feedback/{id}", post(handlers::api::provide_feedback))
            .route("/statistics", get(handlers::api::get_statistics)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::db_pool::DuckDBConnectionManager;
    use crate::llm::{Completion, LlmError, LlmManager};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use r2d2::Pool;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct CannedModel;

    #[async_trait]
    impl Completion for CannedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok("```sql\nSELECT * FROM \"users\";\n```".to_string())
        }
    }

    async fn test_app() -> Router {
        let manager = DuckDBConnectionManager::new(":memory:".to_string());
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE users (id BIGINT, username VARCHAR, status VARCHAR);
                 INSERT INTO users VALUES (1, 'alice', 'active'), (2, 'bob', 'disabled');",
            )
            .unwrap();
        }

        let llm = LlmManager::with_backend(Box::new(CannedModel));
        let state = Arc::new(AppState::new(AppConfig::default(), pool, llm));
        state.audit.init().await.unwrap();

        api_routes().with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_query(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .header("x-username", "alice")
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn query_endpoint_returns_bounded_sql_and_rows() {
        let app = test_app().await;

        let response = app.oneshot(post_query("Show me all users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["sql"], json!("SELECT * FROM \"users\" LIMIT 1000"));
        assert_eq!(body["resultCount"], json!(2));
        assert_eq!(body["columns"], json!(["id", "username", "status"]));
    }

    #[tokio::test]
    async fn overlong_query_is_rejected_before_an_attempt_starts() {
        let app = test_app().await;

        let long_query = "x".repeat(501);
        let response = app.clone().oneshot(post_query(&long_query)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(
            body["errorMessage"],
            json!("Query content cannot exceed 500 characters")
        );

        // No audit row was written
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/history")
                    .header("x-username", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let history = body_json(response).await;
        assert_eq!(history.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let app = test_app().await;
        let response = app.oneshot(post_query("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn examples_and_schema_are_served() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/examples").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["examples"].as_str().unwrap().contains("Common Query Examples"));

        let response = app
            .oneshot(Request::builder().uri("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["schema"].as_str().unwrap().contains("Table: users"));
    }

    #[tokio::test]
    async fn unknown_feedback_value_is_rejected() {
        let app = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/feedback/1?feedback=WRONG")
                    .header("x-username", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn feedback_round_trip_and_statistics() {
        let app = test_app().await;

        // One successful attempt for alice
        let response = app.clone().oneshot(post_query("Show me all users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Bob cannot attach feedback to alice's attempt
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/feedback/1?feedback=CORRECT")
                    .header("x-username", "bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Alice can
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/feedback/1?feedback=CORRECT&comment=great")
                    .header("x-username", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/statistics")
                    .header("x-username", "alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["totalQueries"], json!(1));
        assert_eq!(stats["successfulQueries"], json!(1));
        assert_eq!(stats["successRate"], json!("100.0%"));
    }
}
