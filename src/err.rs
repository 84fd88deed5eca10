use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::service::ServiceError;

pub type Payload<T> = Result<Envelope<T>, Error>;

pub fn proceeds<V>(message: &'static str, value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Envelope {
        status: StatusCode::OK,
        message: message.to_string(),
        payload: value,
    })
}

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// The `{ message, payload }` body every endpoint answers with. The status
/// travels as the HTTP status code.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
    pub payload: T,
}

impl<T> IntoResponse for Envelope<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    InvalidPayload { message: String },
    #[error("{message}")]
    MissingCredentials { message: String },
    #[error("{message}")]
    AuthenticationFailure { message: String },
    #[error("request timed out")]
    Timeout,
    #[error("{message}")]
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::MissingCredentials { .. } | Error::AuthenticationFailure { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::Timeout | Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not found",
            Error::InvalidPayload { .. } => "bad request",
            Error::MissingCredentials { .. } | Error::AuthenticationFailure { .. } => {
                "unauthorized"
            }
            Error::Timeout => "request timed out",
            Error::InternalError { .. } => {
                "while the request appears to be valid, the server could not complete it"
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            log::error!(status = status.as_u16(); "{}: {}", self.summary(), detail);
        } else {
            log::warn!(status = status.as_u16(); "{}: {}", self.summary(), detail);
        }
        Envelope {
            status,
            message: self.summary().to_string(),
            payload: detail,
        }
        .into_response()
    }
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => Self::NotFound { message },
            ServiceError::InvalidArgument(message) => Self::InvalidPayload { message },
            ServiceError::Unauthorized(message) => Self::AuthenticationFailure { message },
            ServiceError::Internal(message) => Self::InternalError {
                kind: "StorageError",
                message,
            },
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.body_text(),
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(id: uuid::Error) -> Self {
        Self::InvalidPayload {
            message: format!("invalid identifier: {id}"),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InternalError {
            kind: "TokenError",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            Error::from(ServiceError::InvalidArgument("bad price".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::from(ServiceError::NotFound("student not found".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::from(ServiceError::Unauthorized("nope".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::from(ServiceError::Internal("db down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::Timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_identifiers_are_bad_requests() {
        let err = Error::from(uuid::Uuid::parse_str("not-a-uuid").unwrap_err());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn errors_render_inside_the_envelope() {
        let response = Error::NotFound {
            message: "student not found".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["message"], "not found");
        assert_eq!(body["payload"], "student not found");
    }

    #[tokio::test]
    async fn success_envelope_carries_the_payload() {
        let response = proceeds("created successfully", serde_json::json!({ "id": 1 }))
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "created successfully");
        assert_eq!(body["payload"]["id"], 1);
        assert!(body.get("status").is_none());
    }
}
