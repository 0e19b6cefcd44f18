use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG`, falling back to info-level output for
/// this crate and the HTTP trace layer. Generated SQL and model output are
/// logged at debug.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nl_query=info,tower_http=info"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
