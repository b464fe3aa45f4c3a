pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/ws", get(ws::handler::ws_upgrade))
        .route("/stream", put(routes::streams::update_stream))
        .route("/streams", get(routes::streams::list_streams))
        .route("/users", post(routes::users::upsert_user));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(routes::metrics::exposition))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
