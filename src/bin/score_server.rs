//! Standalone server without the Shuttle runtime.
//! Binds $BIND_ADDR (default 0.0.0.0:8080).

use anyhow::Context;
use tracing::info;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    readiness_score::telemetry::init_tracing();

    let app = readiness_score::app().await?;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
