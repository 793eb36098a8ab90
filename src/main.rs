//! Readiness Score Service: Shuttle entrypoint.
//! Boots the Axum router built by the library. See `src/bin/score_server.rs`
//! for a plain Tokio listener.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    readiness_score::telemetry::init_tracing();

    let router = readiness_score::app().await?;
    Ok(router.into())
}
