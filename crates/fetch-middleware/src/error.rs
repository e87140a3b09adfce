//! Errors surfaced through a `FetchHandle` and carried by failure actions
//!
//! `FetchError` is `Clone` so one value can be forwarded in the failure
//! action and returned to the caller. Non-clonable sources are shared via `Arc`.

use crate::transport::ResponseInfo;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Status reported for failures that never produced a response
pub const DEFAULT_FAILURE_STATUS: u16 = 500;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered outside of [200, 300)
    #[error(transparent)]
    Request(#[from] RequestError),

    /// No response at all (connection refused, DNS, TLS, ...)
    #[error("transport error: {0}")]
    Transport(Arc<anyhow::Error>),

    /// A response body was not valid JSON
    #[error("failed to parse response body (status {status}): {source}")]
    BodyParse {
        status: u16,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("auth function failed: {0}")]
    Auth(Arc<anyhow::Error>),

    #[error("cache function failed: {0}")]
    Cache(Arc<anyhow::Error>),

    #[error("fetch descriptor of '{action_type}' has no url")]
    MissingUrl { action_type: String },

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The spawned request task panicked or was cancelled by the runtime
    #[error("request task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    pub fn transport(err: anyhow::Error) -> Self {
        FetchError::Transport(Arc::new(err))
    }

    pub fn body_parse(status: u16, err: serde_json::Error) -> Self {
        FetchError::BodyParse {
            status,
            source: Arc::new(err),
        }
    }

    /// HTTP status of the response this error came from, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Request(err) => Some(err.status),
            FetchError::BodyParse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status recorded in failure actions
    pub fn failure_status(&self) -> u16 {
        self.status().unwrap_or(DEFAULT_FAILURE_STATUS)
    }

    pub fn as_request_error(&self) -> Option<&RequestError> {
        match self {
            FetchError::Request(err) => Some(err),
            _ => None,
        }
    }
}

/// Non-2xx response, with its parsed JSON body
#[derive(Debug, Clone, Error)]
#[error("{status} {status_text}")]
pub struct RequestError {
    pub status: u16,
    pub status_text: String,
    pub response: ResponseInfo,
    pub body: Value,
}
