mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vidtube_api::{AppState, AppStateInner, AuthConfig, LogMailer, MediaStore};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidtube=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .with_context(|| format!("creating media directory {}", config.media_dir.display()))?;

    // Init database
    let db = vidtube_db::Database::open(&config.db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        auth: AuthConfig {
            access_secret: config.access_secret,
            refresh_secret: config.refresh_secret,
            access_ttl: chrono::Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: chrono::Duration::days(config.refresh_ttl_days),
        },
        media: MediaStore::new(&config.media_dir),
        mailer: Arc::new(LogMailer),
        public_url: config.public_url,
        max_upload_bytes: config.max_upload_mb * 1024 * 1024,
    });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::very_permissive().allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid VIDTUBE_CORS_ORIGIN {origin:?}"))?,
        ),
        None => CorsLayer::permissive(),
    };

    let app = vidtube_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("vidtube server listening on {}", addr);

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
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
