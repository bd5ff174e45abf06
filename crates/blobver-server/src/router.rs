use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::SharedState;

/// Build the axum router with all blobver endpoints.
///
/// Every response is marked uncacheable: collections change with each write
/// and clients must not be served an older version by an intermediary.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/api/topics", get(handler::list_topics).post(handler::create_topic))
        .route("/api/topics/:id", put(handler::update_topic).delete(handler::delete_topic))
        .route("/api/auth/register", post(handler::register))
        .route("/api/auth/login", post(handler::login))
        .route(
            "/api/leaderboard/:topic_id",
            get(handler::get_leaderboard).post(handler::submit_run),
        )
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(header::EXPIRES, HeaderValue::from_static("0")))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
