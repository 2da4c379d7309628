//! Custom error types for the API client
//!
//! Every failure coming out of the request pipeline is a [`ClientError`].
//! The helpers at the bottom classify those failures for form code.

use common::error::StorageError;
use common::validation::{self, ValidationError};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Message used when nothing better can be extracted from an error
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Custom error type for the API client
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a complete response
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request, or reading its response, did not complete before its deadline
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-success status
    #[error("Request failed with status {status}")]
    Http {
        status: StatusCode,
        body: Option<Value>,
    },

    /// The server rejected the request payload
    #[error("{error}")]
    Validation {
        status: StatusCode,
        error: ValidationError,
    },

    /// The session could not be recovered and has been destroyed
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// A payload could not be encoded or a response body decoded
    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),

    /// The persisted session could not be read or written
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(e)
        }
    }
}

impl ClientError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } | ClientError::Validation { status, .. } => {
                Some(*status)
            }
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Whether this is a 401 answer from the server
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Turn an HTTP failure whose body is a validation payload, canonical or
    /// legacy, into [`ClientError::Validation`]. Other errors are returned as is.
    pub fn normalized(self) -> Self {
        match self {
            ClientError::Http {
                status,
                body: Some(body),
            } => match ValidationError::from_body(&body) {
                Some(error) => ClientError::Validation { status, error },
                None => ClientError::Http {
                    status,
                    body: Some(body),
                },
            },
            other => other,
        }
    }
}

/// Type alias for client results
pub type ClientResult<T> = Result<T, ClientError>;

/// Whether the error carries a validation payload
pub fn is_validation_error(err: &ClientError) -> bool {
    to_validation_error(err).is_some()
}

/// The canonical validation error carried by `err`, if any
pub fn to_validation_error(err: &ClientError) -> Option<ValidationError> {
    match err {
        ClientError::Validation { error, .. } => Some(error.clone()),
        ClientError::Http {
            body: Some(body), ..
        } => ValidationError::from_body(body),
        _ => None,
    }
}

/// Best-effort human readable message for an error.
///
/// Prefers the validation summary, then a message embedded by the server,
/// then the error's own description.
pub fn error_message(err: &ClientError) -> String {
    if let Some(validation) = to_validation_error(err) {
        return validation.message;
    }

    if let ClientError::Http {
        body: Some(body), ..
    } = err
    {
        if let Some(message) = validation::server_message(body) {
            return message;
        }
    }

    let message = err.to_string();
    if message.is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

/// Like [`error_message`], for any error type.
///
/// Client errors anywhere in the source chain are described with
/// [`error_message`]; everything else falls back to its display text.
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = Some(err);
    while let Some(source) = current {
        if let Some(client_error) = source.downcast_ref::<ClientError>() {
            return error_message(client_error);
        }
        current = source.source();
    }

    let message = err.to_string();
    if message.is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validation_body() -> Value {
        json!({
            "success": false,
            "error": {
                "code": "VALIDATION_ERROR",
                "message": "Request validation failed",
                "details": {
                    "issues": [{ "path": "content", "message": "Required", "code": "too_small" }]
                }
            }
        })
    }

    #[test]
    fn test_normalized_upgrades_validation_bodies() {
        let err = ClientError::Http {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body: Some(json!({ "error": { "message": "Invalid", "errors": { "content": ["Required"] } } })),
        }
        .normalized();

        match err {
            ClientError::Validation { status, error } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(error.issues[0].path, "content");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalized_leaves_other_errors() {
        let err = ClientError::Http {
            status: StatusCode::NOT_FOUND,
            body: Some(json!({ "error": { "code": "not_found", "message": "Post not found" } })),
        }
        .normalized();

        assert!(matches!(err, ClientError::Http { status, .. } if status == StatusCode::NOT_FOUND));
        assert!(matches!(ClientError::Timeout.normalized(), ClientError::Timeout));
    }

    #[test]
    fn test_to_validation_error() {
        let raw = ClientError::Http {
            status: StatusCode::BAD_REQUEST,
            body: Some(validation_body()),
        };
        let expected = ValidationError::from_body(&validation_body()).unwrap();

        assert_eq!(to_validation_error(&raw), Some(expected.clone()));
        assert!(is_validation_error(&raw));
        assert_eq!(to_validation_error(&raw.normalized()), Some(expected));
    }

    #[test]
    fn test_plain_server_error_is_not_validation() {
        let err = ClientError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: None,
        };

        assert_eq!(to_validation_error(&err), None);
        assert!(!is_validation_error(&err));
        assert!(!is_validation_error(&ClientError::SessionExpired));
    }

    #[test]
    fn test_error_message_prefers_validation_summary() {
        let err = ClientError::Http {
            status: StatusCode::BAD_REQUEST,
            body: Some(validation_body()),
        }
        .normalized();

        assert_eq!(error_message(&err), "Request validation failed");
    }

    #[test]
    fn test_error_message_fallback_chain() {
        let server = ClientError::Http {
            status: StatusCode::NOT_FOUND,
            body: Some(json!({ "error": { "code": "not_found", "message": "Post not found" } })),
        };
        assert_eq!(error_message(&server), "Post not found");

        let bare = ClientError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: None,
        };
        assert_eq!(
            error_message(&bare),
            "Request failed with status 500 Internal Server Error"
        );

        assert_eq!(error_message(&ClientError::Timeout), "Request timed out");
    }

    #[test]
    fn test_describe_finds_client_errors() {
        let err = ClientError::SessionExpired;
        assert_eq!(describe(&err), "Session expired, please log in again");

        let io = std::io::Error::other("");
        assert_eq!(describe(&io), FALLBACK_ERROR_MESSAGE);
    }

    #[test]
    fn test_status_and_unauthorized() {
        let err = ClientError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: None,
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(!ClientError::Timeout.is_unauthorized());
        assert_eq!(ClientError::Timeout.status(), None);
    }
}
