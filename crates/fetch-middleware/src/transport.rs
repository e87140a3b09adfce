//! HTTP transport seam
//!
//! The middleware builds a `FetchRequest` and hands it to a `Transport`.
//! `ReqwestTransport` is the default implementation; tests substitute an
//! in-memory one.

use crate::action::FormData;
use crate::headers::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use fetch_config::Credentials;
use serde_json::Value;
use url::Url;

/// A fully resolved request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: Url,
    /// As given by the descriptor, compare case-insensitively
    pub method: String,
    pub headers: HeaderMap,
    pub credentials: Credentials,
    pub body: Option<RequestBody>,
}

impl FetchRequest {
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON or text passed through as-is
    Text(String),
    Form(FormData),
}

impl RequestBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            RequestBody::Form(_) => None,
        }
    }
}

/// A received response with its body fully read
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Everything but the body
    pub fn info(&self) -> ResponseInfo {
        ResponseInfo {
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// Response metadata kept on request errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
}

/// Executes requests
///
/// Implementations must be `Send + Sync`; one transport is shared by every
/// in-flight request of a middleware instance. Errors mean no response was
/// received at all. Non-2xx responses are returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: FetchRequest) -> anyhow::Result<FetchResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &'static str) -> FetchResponse {
        FetchResponse {
            url: "http://localhost/test.json".into(),
            status,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_success_range() {
        assert!(response(200, "").is_success());
        assert!(response(204, "").is_success());
        assert!(response(299, "").is_success());
        assert!(!response(199, "").is_success());
        assert!(!response(300, "").is_success());
        assert!(!response(404, "").is_success());
    }

    #[test]
    fn test_json_body() {
        assert_eq!(response(200, r#"{"data":true}"#).json().unwrap(), json!({"data": true}));
        assert!(response(404, "Not found").json().is_err());
    }
}
