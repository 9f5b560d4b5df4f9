use std::env;
use std::time::Duration;

use anyhow::Result;
use campus_api::{build_router, build_state, spawn_session_purger};
use campus_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("campus_api");

    let bind = env::var("CAMPUS_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = build_state()?;
    let purger = spawn_session_purger(state.clone(), Duration::from_secs(60));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "privacy filter api started");

    axum::serve(listener, app).await?;
    purger.abort();
    Ok(())
}
