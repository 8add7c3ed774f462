//! REST proxy endpoint

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::proxy::{ProxyBody, ProxyRequest, ProxyResponse, RestProxy};

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        match self.body {
            ProxyBody::Json(value) => (self.status, Json(value)).into_response(),
            ProxyBody::Text(text) => (self.status, text).into_response(),
        }
    }
}

/// Handler for ALL /rest and /rest/{*path}
///
/// Forwards the request to the configured REST upstream and mirrors its
/// status and body. Disallowed methods get 405, upstream failures 500.
pub async fn proxy_handler(
    State(proxy): State<Arc<RestProxy>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    match proxy.forward(request).await {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}
