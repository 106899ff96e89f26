mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vidtube_api::routes::router;
use vidtube_api::session::SessionManager;
use vidtube_api::state::{AppState, AppStateInner};
use vidtube_db::Database;
use vidtube_media::{CloudinaryStore, MediaAssets};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vidtube=debug,vidtube_api=debug,vidtube_db=debug,vidtube_media=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    let weak = config.weak_secrets();
    if !weak.is_empty() {
        eprintln!("FATAL: {} unset or still a placeholder.", weak.join(" and "));
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    // Init database, media store and sessions
    let db = Database::open(&config.db_path)?;
    let store = CloudinaryStore::new(config.cloudinary.clone())?;
    let sessions = SessionManager::new(&config.tokens)?;
    tokio::fs::create_dir_all(&config.api.temp_dir).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        media: MediaAssets::new(Arc::new(store)),
        sessions,
        settings: config.api.clone(),
    });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        None => {
            warn!("CORS_ORIGIN unset, allowing any origin without credentials");
            CorsLayer::permissive()
        }
    };

    let app = router(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("VidTube server listening on {}", addr);
    info!("Admin user routes: {:?}", config.api.admin_routes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
