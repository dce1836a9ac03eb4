//! Error handler for hireboard.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

use crate::application::Status;
use crate::blob::BlobError;
use crate::database::StoreError;
use crate::token::TokenError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("{0}")]
    Unauthenticated(TokenError),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("application is already {0}")]
    InvalidTransition(Status),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("storage request failed: {0}")]
    Store(#[from] StoreError),

    #[error("blob storage request failed: {0}")]
    Blob(#[from] BlobError),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServerError {
    /// Shortcut for a single-field validation failure.
    pub fn field(field: &'static str, code: &'static str, message: &str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(
            field,
            ValidationError::new(code).with_message(message.to_owned().into()),
        );
        ServerError::Validation(errors)
    }

    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ServerError::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<TokenError> for ServerError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Ledger(err) => ServerError::Store(err),
            TokenError::Signing(err) => ServerError::internal("token signing failed", err),
            err => ServerError::Unauthenticated(err),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::Axum(rejection) => response
                .title("Request body could not be parsed.")
                .details(&rejection.body_text()),

            ServerError::Unauthenticated(_) => response
                .title("Authentication required.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Forbidden(_) => response
                .title("Access denied.")
                .status(StatusCode::FORBIDDEN),

            ServerError::NotFound(_) => response
                .title("Resource not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Conflict(_) => response.title("Resource already exists."),

            ServerError::InvalidCredentials => response.title("Invalid credentials."),

            ServerError::InvalidTransition(_) => response
                .title("Status change not allowed.")
                .status(StatusCode::CONFLICT),

            ServerError::PreconditionFailed(_) => response
                .title("Request cannot be fulfilled yet.")
                .status(StatusCode::UNPROCESSABLE_ENTITY),

            ServerError::Store(err) => {
                tracing::error!(error = %err, "store request failed");
                ResponseError::default()
            },

            ServerError::Blob(err) => {
                tracing::error!(error = %err, "blob store request failed");
                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServerError::field("email", "email", "Email must be formatted."), StatusCode::BAD_REQUEST),
            (ServerError::Unauthenticated(TokenError::Missing), StatusCode::UNAUTHORIZED),
            (ServerError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (ServerError::NotFound("position"), StatusCode::NOT_FOUND),
            (ServerError::Conflict("already applied".into()), StatusCode::BAD_REQUEST),
            (ServerError::InvalidCredentials, StatusCode::BAD_REQUEST),
            (ServerError::InvalidTransition(Status::Accepted), StatusCode::CONFLICT),
            (ServerError::PreconditionFailed("create portfolio first".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::Store(StoreError::backend("down")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_token_ledger_failure_is_not_unauthenticated() {
        let err: ServerError = TokenError::Ledger(StoreError::backend("timeout")).into();
        assert!(matches!(err, ServerError::Store(_)));

        let err: ServerError = TokenError::Revoked.into();
        assert!(matches!(err, ServerError::Unauthenticated(TokenError::Revoked)));
    }
}
