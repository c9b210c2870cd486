use reqwest::StatusCode;
use thiserror::Error;

use pulse_types::api::FieldError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gateway error: {0}")]
    Gateway(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("gateway closed before Ready")]
    GatewayRejected,

    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// The inline field error for a rejected form (422 or 409), if any.
    pub fn field_error(&self) -> Option<FieldError> {
        match self {
            Self::Http { status, body }
                if *status == StatusCode::UNPROCESSABLE_ENTITY || *status == StatusCode::CONFLICT =>
            {
                serde_json::from_str(body).ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_only_for_form_statuses() {
        let body = r#"{"field":"username","message":"Username is already taken"}"#.to_string();
        let conflict = ClientError::Http { status: StatusCode::CONFLICT, body: body.clone() };
        assert_eq!(conflict.field_error().map(|f| f.field), Some("username".to_string()));
        assert_eq!(conflict.status(), Some(StatusCode::CONFLICT));

        let server = ClientError::Http { status: StatusCode::INTERNAL_SERVER_ERROR, body };
        assert!(server.field_error().is_none());
        assert!(ClientError::NotSignedIn.field_error().is_none());
    }
}
