//! Two small HTTP servers: a fixed-route text site and an in-memory user
//! list with CRUD routes. Each binary under `src/bin` serves one of them.

pub mod static_site;
pub mod user_list;

use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Load `.env`, install logging and serve `app` on `DEMO_HOST:DEMO_PORT`
/// (default `127.0.0.1:3000`) until Ctrl+C.
pub async fn serve(name: &str, app: Router) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demo_servers=debug,tower_http=debug".into()),
        )
        .init();

    let host = std::env::var("DEMO_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("DEMO_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("{} running at http://{}/", name, addr);

    axum::serve(listener, app.layer(TraceLayer::new_for_http()))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received Ctrl+C, shutting down...");
        })
        .await?;

    Ok(())
}
