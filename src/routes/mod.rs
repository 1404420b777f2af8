pub mod auth;
pub mod catalog;
pub mod feed;
pub mod notifications;
pub mod posts;
pub mod profiles;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Room for multipart framing and text fields on top of the largest file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// The full HTTP surface with its layers applied.
pub fn app(state: AppState) -> Router {
    let body_limit = state
        .config
        .posts
        .image_max_bytes
        .max(state.config.profile.avatar_max_bytes)
        + MULTIPART_OVERHEAD;
    let cors = cors_layer(&state.config.server);

    let router = Router::new()
        .route("/health", get(health))
        .route("/media/{*key}", get(crate::media::serve))
        .merge(auth::router())
        .merge(catalog::router())
        .merge(feed::router())
        .merge(posts::router())
        .merge(profiles::router())
        .merge(notifications::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Credentialed CORS for the configured origins. No layer when none are set.
fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
    )
}
