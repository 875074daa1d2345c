mod algorithms;
mod config;
mod error;
mod handlers;
mod models;
mod persistence;

use axum::http::{header, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use config::ServerConfig;
use handlers::{app, AppState};
use persistence::MemoryStore;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = ServerConfig::from_env();

    let state = AppState::new(Arc::new(MemoryStore::new()));

    let origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let router = app(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("Timetable generator listening on http://{}", config.bind_addr);
    axum::serve(listener, router).await
}
