use anyhow::Result;
use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Router,
};
use bazaar_core::BazaarContext;
use bazaar_logstream::LogEmitter;
use std::env;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing;

use crate::auth;
use crate::handlers;
use crate::socket;

pub async fn run(ctx: BazaarContext) -> Result<()> {
    let port = ctx.config.server.port;
    let emitter = LogEmitter::new(ctx.producer.clone());

    // Allow specific origins when configured, permissive otherwise
    let cors_layer = if let Ok(origins) = env::var("CORS_ORIGINS") {
        let origin_list: Vec<&str> = origins.split(',').map(|s| s.trim()).collect();
        let mut cors = CorsLayer::new();
        for origin in origin_list {
            if let Ok(parsed) = origin.parse::<axum::http::HeaderValue>() {
                cors = cors.allow_origin(parsed);
            }
        }
        cors.allow_methods(Any).allow_headers(Any)
    } else {
        tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
        CorsLayer::permissive()
    };

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(socket::websocket_handler))
        .route("/api/v1/auth/token", post(handlers::mint_token))
        .route("/api/v1/conversations", get(handlers::get_conversations))
        .route("/api/v1/messages", get(handlers::get_messages))
        .route("/api/v1/unseen", get(handlers::get_unseen_count))
        .route("/api/v1/logs", post(handlers::ingest_log))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(ctx))
                .layer(Extension(emitter))
                .layer(middleware::from_fn(auth::auth_middleware))
                .layer(cors_layer),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting gateway server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
