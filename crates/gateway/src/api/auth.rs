//! API authentication middleware: resolves the caller's [`Principal`] via
//! [`AuthBinding`] and attaches it as a request extension for downstream
//! handlers. Unauthenticated requests are rejected with `forbidden`
//! before reaching a handler (§4.9).

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response as AxumResponse;

use crate::auth::Principal;
use crate::errors::ApiError;
use crate::state::AppState;

pub async fn require_principal(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> AxumResponse {
    let bearer = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let api_key = req.headers().get("x-api-key").and_then(|v| v.to_str().ok());

    match state.auth.resolve(bearer, api_key).await {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(e) => {
            let api_err: ApiError = e.into();
            axum::response::IntoResponse::into_response(api_err)
        }
    }
}

/// Extension-based extractor so handlers can take `Extension<Principal>`
/// without re-resolving credentials.
pub type PrincipalExt = axum::extract::Extension<Principal>;
