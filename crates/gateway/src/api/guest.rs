//! `/auth/guest-login` and `/auth/refresh-token` (§6). Minimal token
//! issuance on top of [`AuthBinding`]'s API-key store — no separate
//! identity provider is in scope here.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use ro_domain::error::Error;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user_id: String,
}

pub async fn guest_login(State(state): State<AppState>) -> Json<TokenResponse> {
    let user_id = format!("guest_{}", Uuid::new_v4().simple());
    let (token, record) = state.auth.issue_api_key(&user_id);
    Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_in: state.config.auth.api_key_default_ttl_secs,
        user_id: record.user_id,
    })
}

pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<TokenResponse>> {
    let old = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| Error::forbidden("missing bearer token to refresh"))?;

    let (token, record) = state.auth.refresh_api_key(old)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_in: state.config.auth.api_key_default_ttl_secs,
        user_id: record.user_id,
    }))
}
