//! HTTP endpoints
//!
//! Handlers call into the gateway components and convert their
//! [`Error`](crate::Error) into a response in one place.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::schema::ErrorBody;
use crate::Error;

pub mod project;
pub mod proxy;
pub mod query;
pub mod rows;
pub mod tables;

// Re-export handlers for convenience
pub use project::project_handler;
pub use proxy::proxy_handler;
pub use query::{execute_parameterized_handler, execute_query_handler};
pub use rows::table_rows_handler;
pub use tables::{list_tables_handler, table_metadata_handler};

/// HTTP status for each error kind
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) | Error::Execution(_) | Error::InvalidIdentifier(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::TableNotFound { .. } => StatusCode::NOT_FOUND,
        Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        Error::Proxy(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        // Upstream failure details stay in the logs
        let message = match &self {
            Error::Proxy(_) => "Failed to forward request".to_string(),
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, reporting malformed input as a validation error
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> crate::Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| Error::Validation(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(
            status_for(&Error::Validation("too long".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::Execution("syntax error".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::InvalidIdentifier("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::TableNotFound {
                schema: "public".into(),
                table: "missing".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::MethodNotAllowed("TRACE".into())),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            status_for(&Error::Proxy("connection refused".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn proxy_errors_hide_upstream_details() {
        let response = Error::Proxy("connection refused to 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "ProxyError");
        assert_eq!(body["message"], "Failed to forward request");
    }
}
