//! Error taxonomy shared by every storefront operation.
//!
//! Callers pattern-match on the variant, never on the message. The HTTP
//! mapping lives here so handlers can return `ApiError` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No session token, or the token resolves to no user.
    #[error("authentication required")]
    Unauthenticated,

    /// The session is valid but the actor does not own the resource.
    #[error("not allowed to access this resource")]
    Forbidden,

    /// The resource is absent, or exists but belongs to another user.
    /// Both cases produce identical responses so item ids never leak
    /// ownership information.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed input rejected before any mutation.
    #[error("{0}")]
    Validation(String),

    /// A well-formed request asking for an illegal state transition.
    #[error("{0}")]
    InvalidState(&'static str),

    /// Uniqueness clash on user-supplied data (duplicate email).
    #[error("{0}")]
    Conflict(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("password hashing failed")]
    PasswordHash,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidState(_) | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Database(_) | Self::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 500s carry a generic body; details go to the log only.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    /// Collapse a validation report to the first failing field's message.
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|field| field.iter())
            .filter_map(|e| e.message.as_ref())
            .map(ToString::to_string)
            .next()
            .unwrap_or_else(|| "invalid request".to_string());
        Self::Validation(message)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_report_uses_first_message() {
        use validator::Validate;

        #[derive(Validate)]
        struct Form {
            #[validate(length(min = 2, message = "name too short"))]
            name: String,
        }

        let err = Form {
            name: "x".to_string(),
        }
        .validate()
        .unwrap_err();
        match ApiError::from(err) {
            ApiError::Validation(msg) => assert_eq!(msg, "name too short"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("phone").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::InvalidState("no").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PasswordHash.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
