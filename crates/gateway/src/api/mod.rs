pub mod auth;
pub mod guest;
pub mod health;
pub mod responses;
pub mod shares;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full HTTP router (§6). `/v1/responses*` and
/// `/v1/public/shares` (create) require a resolved principal; public
/// share reads, auth bootstrap, and health probes do not.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/v1/public/shares/:slug", get(shares::get))
        .route("/auth/guest-login", post(guest::guest_login))
        .route("/auth/refresh-token", get(guest::refresh_token));

    let protected = Router::new()
        .route("/v1/responses", post(responses::create))
        .route("/v1/responses/:id", get(responses::get))
        .route("/v1/responses/:id/cancel", post(responses::cancel))
        .route("/v1/public/shares", post(shares::create))
        .route_layer(middleware::from_fn_with_state(state, auth::require_principal));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
