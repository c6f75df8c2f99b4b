//! Maps the domain error taxonomy onto HTTP status codes. Kept here
//! rather than in `ro-domain` because that crate carries no axum
//! dependency (see its `error` module doc comment).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ro_domain::error::{Error, ErrorKind};
use serde_json::json;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Expired => StatusCode::UNAUTHORIZED,
        ErrorKind::External => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, kind = %self.0.kind, message = %self.0.message, "request failed");
        }
        (
            status,
            Json(json!({
                "error": {
                    "kind": self.0.kind.as_str(),
                    "message": self.0.message,
                    "code": self.0.code.to_string(),
                    "response_id": self.0.response_id,
                }
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn expired_maps_to_401() {
        assert_eq!(status_for(ErrorKind::Expired), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn external_maps_to_502() {
        assert_eq!(status_for(ErrorKind::External), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_maps_to_500() {
        assert_eq!(status_for(ErrorKind::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_id_attached_at_the_call_site_survives_into_the_api_error() {
        let e = Error::not_found("response r_1 not found").with_response_id("r_1");
        let api_err: ApiError = e.into();
        assert_eq!(api_err.0.response_id.as_deref(), Some("r_1"));
    }

    #[test]
    fn response_id_defaults_to_none_when_not_attached() {
        let e = Error::validation("bad request");
        assert!(e.response_id.is_none());
    }
}
