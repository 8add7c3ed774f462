//! Forwarding of REST requests to the REST-over-SQL upstream
//!
//! Each inbound request goes through validate, rewrite, forward and
//! translate. There is exactly one outbound call per inbound call and no
//! retry.

use crate::config::RestSettings;
use crate::{Error, Result};
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Path prefix the gateway mounts the proxy under
pub const REST_PREFIX: &str = "/rest";

/// Headers that describe the inbound connection rather than the request
const NON_FORWARDED_HEADERS: [header::HeaderName; 9] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
    header::ACCEPT_ENCODING,
];

/// Whether the proxy forwards requests with this method
pub fn is_allowed_method(method: &Method) -> bool {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ]
    .contains(method)
}

/// An inbound request as seen by the proxy
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,

    /// Full inbound path, including [`REST_PREFIX`]
    pub path: String,

    /// Raw query string without the leading `?`
    pub query: Option<String>,

    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Decoded upstream response body
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyBody {
    Json(Value),
    Text(String),
}

/// Upstream response mirrored back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: ProxyBody,
}

/// Client for the REST-over-SQL upstream
#[derive(Debug, Clone)]
pub struct RestProxy {
    client: Client,
    upstream_base_url: String,
}

impl RestProxy {
    /// Build a proxy with its own HTTP client
    pub fn new(settings: &RestSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(timeout));
        }
        let client = builder
            .build()
            .map_err(|error| Error::Proxy(error.to_string()))?;

        Ok(Self::with_client(client, settings.upstream_base_url.clone()))
    }

    /// Build a proxy around an existing client
    pub fn with_client(client: Client, upstream_base_url: impl Into<String>) -> Self {
        Self {
            client,
            upstream_base_url: upstream_base_url.into(),
        }
    }

    pub fn upstream_base_url(&self) -> &str {
        &self.upstream_base_url
    }

    /// Map an inbound path and query string onto the upstream
    ///
    /// `/rest/items` with `limit=5` becomes `{upstream}/items?limit=5`. The
    /// query string is appended verbatim.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let remainder = path.strip_prefix(REST_PREFIX).unwrap_or(path);
        let mut url = format!(
            "{}/{}",
            self.upstream_base_url.trim_end_matches('/'),
            remainder.trim_start_matches('/')
        );

        if let Some(query) = query.filter(|query| !query.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        url
    }

    /// Headers sent upstream: inbound headers minus connection-level ones,
    /// with JSON forced for `Content-Type` and `Accept`
    fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        for name in NON_FORWARDED_HEADERS.iter() {
            headers.remove(name);
        }

        let json = HeaderValue::from_static("application/json");
        headers.insert(header::CONTENT_TYPE, json.clone());
        headers.insert(header::ACCEPT, json);
        headers
    }

    /// Forward a request and translate the upstream response
    pub async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        if !is_allowed_method(&request.method) {
            tracing::warn!(method = %request.method, path = %request.path, "Rejected REST proxy method");
            return Err(Error::MethodNotAllowed(request.method.to_string()));
        }

        let original_url = match &request.query {
            Some(query) => format!("{}?{}", request.path, query),
            None => request.path.clone(),
        };
        let target_url = self.target_url(&request.path, request.query.as_deref());

        let mut outbound = self
            .client
            .request(request.method.clone(), &target_url)
            .headers(Self::outbound_headers(&request.headers));
        if request.method != Method::GET && request.method != Method::HEAD {
            outbound = outbound.body(request.body);
        }

        let result = self.send(outbound).await;
        match &result {
            Ok(response) => tracing::info!(
                method = %request.method,
                original_url = %original_url,
                target_url = %target_url,
                status = response.status.as_u16(),
                "Proxied REST request"
            ),
            Err(error) => tracing::error!(
                method = %request.method,
                original_url = %original_url,
                target_url = %target_url,
                error = %error,
                "REST proxy request failed"
            ),
        }
        result
    }

    async fn send(&self, outbound: reqwest::RequestBuilder) -> Result<ProxyResponse> {
        let response = outbound
            .send()
            .await
            .map_err(|error| Error::Proxy(error.to_string()))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("json"))
            .unwrap_or(false);

        let bytes = response
            .bytes()
            .await
            .map_err(|error| Error::Proxy(error.to_string()))?;

        let body = if is_json && !bytes.is_empty() {
            let value = serde_json::from_slice(&bytes)
                .map_err(|error| Error::Proxy(format!("Invalid JSON from upstream: {}", error)))?;
            ProxyBody::Json(value)
        } else {
            ProxyBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        };

        Ok(ProxyResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(base: &str) -> RestProxy {
        RestProxy::with_client(Client::new(), base)
    }

    #[test]
    fn rewrites_path_and_keeps_query_verbatim() {
        let proxy = proxy("http://upstream:3001");
        assert_eq!(
            proxy.target_url("/rest/items", Some("limit=5")),
            "http://upstream:3001/items?limit=5"
        );
        assert_eq!(
            proxy.target_url("/rest/items", Some("name=eq.a%20b&order=id.desc")),
            "http://upstream:3001/items?name=eq.a%20b&order=id.desc"
        );
    }

    #[test]
    fn avoids_double_slashes() {
        let proxy = proxy("http://upstream:3001/api/");
        assert_eq!(
            proxy.target_url("/rest/items/1", None),
            "http://upstream:3001/api/items/1"
        );
        assert_eq!(proxy.target_url("/rest", Some("")), "http://upstream:3001/api/");
    }

    #[test]
    fn allowed_methods() {
        for method in [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(is_allowed_method(&method));
        }
        for method in [Method::TRACE, Method::HEAD, Method::OPTIONS, Method::CONNECT] {
            assert!(!is_allowed_method(&method));
        }
    }

    #[test]
    fn outbound_headers_force_json() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        inbound.insert("prefer", HeaderValue::from_static("return=representation"));

        let headers = RestProxy::outbound_headers(&inbound);

        assert!(headers.get(header::HOST).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer t");
        assert_eq!(headers["prefer"], "return=representation");
    }

    #[tokio::test]
    async fn trace_is_rejected_without_a_call() {
        // Port 9 is discard; a call would fail with a proxy error, not 405
        let proxy = proxy("http://127.0.0.1:9");
        let error = proxy
            .forward(ProxyRequest {
                method: Method::TRACE,
                path: "/rest/items".to_string(),
                query: None,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(error, Error::MethodNotAllowed(method) if method == "TRACE"));
    }
}
