use axum::{extract::State, http::Method, response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod amenities;
pub mod bookings;
pub mod error;
pub mod invoices;
pub mod metrics;
pub mod middleware;
pub mod payments;
pub mod state;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler));

    let protected = Router::new()
        .merge(bookings::routes())
        .merge(amenities::routes())
        .merge(payments::routes())
        .merge(invoices::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
