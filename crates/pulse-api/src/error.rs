use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use pulse_types::api::FieldError;

/// Everything a handler can fail with. Domain failures carry a body the
/// form can render inline; internal ones are logged and hidden.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}: {}", .0.field, .0.message)]
    Validation(FieldError),

    #[error("{}: {}", .0.field, .0.message)]
    Conflict(FieldError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        })
    }

    pub fn conflict(field: &str, message: &str) -> Self {
        Self::Conflict(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        })
    }

    /// Turn a unique violation on the users table into the conflict for the
    /// column that fired. Anything else passes through.
    pub fn user_conflict(self) -> Self {
        let Self::Internal(inner) = &self else { return self };
        match pulse_db::unique_violation_column(inner).as_deref() {
            Some("username") => Self::conflict("username", "Username is already taken"),
            Some("email") => Self::conflict("email", "An account with this email already exists"),
            _ => self,
        }
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        Self::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(body) => (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response(),
            Self::Conflict(body) => (StatusCode::CONFLICT, Json(body)).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Invalid credentials" })),
            )
                .into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response(),
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Something went wrong" })),
                )
                    .into_response()
            }
        }
    }
}

/// Run a blocking DB call off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_db::Database;

    fn duplicate(username: &str, email: &str) -> ApiError {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "dana", "dana@example.com", "hash", Utc::now()).unwrap();
        ApiError::Internal(db.create_user("u2", username, email, "hash", Utc::now()).unwrap_err())
    }

    fn conflict_field(err: ApiError) -> Option<String> {
        match err {
            ApiError::Conflict(body) => Some(body.field),
            _ => None,
        }
    }

    #[test]
    fn test_user_conflict_names_the_fired_column() {
        let err = duplicate("robin", "dana@example.com").user_conflict();
        assert_eq!(conflict_field(err).as_deref(), Some("email"));

        let err = duplicate("Dana", "robin@example.com").user_conflict();
        assert_eq!(conflict_field(err).as_deref(), Some("username"));
    }

    #[test]
    fn test_user_conflict_passes_other_errors_through() {
        let err = ApiError::Internal(anyhow::anyhow!("disk full")).user_conflict();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(matches!(ApiError::NotFound.user_conflict(), ApiError::NotFound));
    }
}
