pub mod admin;
pub mod auth;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All API routes. Layers such as tracing and CORS are added by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/events", get(events::list_events))
        .route("/events/{event_id}", get(events::get_event))
        .route("/events/{event_id}/join", post(events::join_event))
        .route("/events/{event_id}/leave", post(events::leave_event))
        .route("/my-events", get(events::my_events))
        .route("/admin/events", post(admin::create_event))
        .route(
            "/admin/events/{event_id}",
            put(admin::update_event).delete(admin::delete_event),
        )
        .route("/admin/events/{event_id}/status", put(admin::update_event_status))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
