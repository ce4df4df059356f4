mod auth;
mod config;
mod error;
mod models;
mod routes;
mod storage;
mod thumbnails;
mod video;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use auth::session::SessionStore;
use config::Config;
use storage::VideoStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: VideoStore,
    pub sessions: Arc<SessionStore>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tokio::fs::create_dir_all(&config.video_dir)
        .await
        .expect("failed to create video directory");
    tokio::fs::create_dir_all(&config.thumbnail_dir)
        .await
        .expect("failed to create thumbnail directory");

    let state = AppState {
        store: VideoStore::new(&config.video_dir, &config.thumbnail_dir),
        sessions: Arc::new(SessionStore::new()),
        config: config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .expect("invalid CORS_ORIGIN"),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let mut app = routes::api_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(static_dir) = &config.static_dir {
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
