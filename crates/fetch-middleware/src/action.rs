//! Actions flowing through the dispatch pipeline
//!
//! `Action` is what the application dispatches. When it carries a
//! `FetchDescriptor`, the middleware turns it into a request and forwards
//! derived lifecycle actions (`NextAction`) to the next stage.

use crate::error::FetchError;
use crate::headers::HeaderMap;
use bytes::Bytes;
use fetch_config::Credentials;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub const PENDING_SUFFIX: &str = "_PENDING";
pub const FAILURE_SUFFIX: &str = "_FAILURE";

/// Computes the value of the `authorization` header. `Ok(None)` sends no header.
pub type AuthFn<S> = Arc<dyn Fn(&S, &Action<S>) -> anyhow::Result<Option<String>> + Send + Sync>;

/// Looks up an already fetched body. `Ok(Some(_))` skips the network entirely.
pub type CacheFn<S> = Arc<dyn Fn(&S, &Action<S>) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Application action, optionally describing a fetch
pub struct Action<S> {
    pub action_type: String,
    pub payload: Option<Payload>,
    pub fetch: Option<FetchDescriptor<S>>,
}

impl<S> Action<S> {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
            fetch: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_fetch(mut self, fetch: FetchDescriptor<S>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Payload that should become a request body
    pub fn body_payload(&self) -> Option<&Payload> {
        self.payload.as_ref().filter(|p| !p.is_empty())
    }
}

impl<S> Clone for Action<S> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: self.payload.clone(),
            fetch: self.fetch.clone(),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("action_type", &self.action_type)
            .field("payload", &self.payload)
            .field("fetch", &self.fetch)
            .finish()
    }
}

/// Action payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    /// Multipart form, the transport assigns content-type and boundary
    Form(FormData),
}

impl Payload {
    /// Empty payloads never become request bodies
    ///
    /// JSON `null`, `false`, `0` and `""` count as empty, as does empty text.
    /// Forms are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Json(Value::Null) | Payload::Json(Value::Bool(false)) => true,
            Payload::Json(Value::String(s)) => s.is_empty(),
            Payload::Json(Value::Number(n)) => n.as_f64() == Some(0.0),
            Payload::Json(_) => false,
            Payload::Text(s) => s.is_empty(),
            Payload::Form(_) => false,
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Payload::Form(_))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<FormData> for Payload {
    fn from(form: FormData) -> Self {
        Payload::Form(form)
    }
}

/// Multipart form content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    pub parts: Vec<FormPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        mime: Option<String>,
        bytes: Bytes,
    },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        mime: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: FormValue::File {
                filename: filename.into(),
                mime: mime.map(str::to_string),
                bytes: bytes.into(),
            },
        });
        self
    }
}

/// Authorization behaviour of a descriptor or of the global config
pub enum AuthSetting<S> {
    /// Defer to the global config (a descriptor without `auth`)
    Inherit,
    /// Never send an authorization header
    Disabled,
    /// Send one using the global provider
    Enabled,
    /// Send one using this provider
    Provider(AuthFn<S>),
}

impl<S> AuthSetting<S> {
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn(&S, &Action<S>) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        AuthSetting::Provider(Arc::new(f))
    }

    /// JS-style truthiness: `Enabled` and `Provider` are truthy
    pub fn is_truthy(&self) -> bool {
        matches!(self, AuthSetting::Enabled | AuthSetting::Provider(_))
    }

    pub fn as_provider(&self) -> Option<&AuthFn<S>> {
        match self {
            AuthSetting::Provider(f) => Some(f),
            _ => None,
        }
    }
}

impl<S> Default for AuthSetting<S> {
    fn default() -> Self {
        AuthSetting::Inherit
    }
}

impl<S> From<bool> for AuthSetting<S> {
    fn from(enabled: bool) -> Self {
        if enabled {
            AuthSetting::Enabled
        } else {
            AuthSetting::Disabled
        }
    }
}

impl<S> Clone for AuthSetting<S> {
    fn clone(&self) -> Self {
        match self {
            AuthSetting::Inherit => AuthSetting::Inherit,
            AuthSetting::Disabled => AuthSetting::Disabled,
            AuthSetting::Enabled => AuthSetting::Enabled,
            AuthSetting::Provider(f) => AuthSetting::Provider(Arc::clone(f)),
        }
    }
}

impl<S> fmt::Debug for AuthSetting<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSetting::Inherit => f.write_str("Inherit"),
            AuthSetting::Disabled => f.write_str("Disabled"),
            AuthSetting::Enabled => f.write_str("Enabled"),
            AuthSetting::Provider(_) => f.write_str("Provider(<fn>)"),
        }
    }
}

/// Describes how to retrieve the data for an action
pub struct FetchDescriptor<S> {
    /// Absolute, or relative to the configured base URL.
    /// Required unless `cache` resolves.
    pub url: Option<String>,
    /// Defaults to `GET`
    pub method: Option<String>,
    pub headers: HeaderMap,
    pub credentials: Option<Credentials>,
    pub auth: AuthSetting<S>,
    pub cache: Option<CacheFn<S>>,
}

impl<S> FetchDescriptor<S> {
    pub fn new() -> Self {
        Self {
            url: None,
            method: None,
            headers: HeaderMap::new(),
            credentials: None,
            auth: AuthSetting::Inherit,
            cache: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new().url(url)
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn auth(mut self, auth: impl Into<AuthSetting<S>>) -> Self {
        self.auth = auth.into();
        self
    }

    pub fn auth_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Action<S>) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        self.auth = AuthSetting::provider(f);
        self
    }

    pub fn cache<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Action<S>) -> anyhow::Result<Option<Value>> + Send + Sync + 'static,
    {
        self.cache = Some(Arc::new(f));
        self
    }

    /// Method to send, `GET` when unset or blank
    pub fn method_or_default(&self) -> &str {
        self.method
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .unwrap_or("GET")
    }
}

impl<S> Default for FetchDescriptor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for FetchDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            credentials: self.credentials,
            auth: self.auth.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S> fmt::Debug for FetchDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDescriptor")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("credentials", &self.credentials)
            .field("auth", &self.auth)
            .field("cache", &self.cache.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Correlates the pending and terminal actions of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the middleware forwards to the next stage
pub enum NextAction<S> {
    /// An action without a fetch descriptor, untouched
    Forward(Action<S>),
    Pending(PendingAction<S>),
    Success(SuccessAction<S>),
    Failure(FailureAction<S>),
}

impl<S> NextAction<S> {
    pub fn action_type(&self) -> &str {
        match self {
            NextAction::Forward(action) => &action.action_type,
            NextAction::Pending(pending) => &pending.action_type,
            NextAction::Success(success) => &success.action_type,
            NextAction::Failure(failure) => &failure.action_type,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NextAction::Failure(failure) if failure.error)
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            NextAction::Forward(_) => None,
            NextAction::Pending(pending) => Some(pending.meta.request_id),
            NextAction::Success(success) => Some(success.meta.request_id),
            NextAction::Failure(failure) => Some(failure.meta.request_id),
        }
    }
}

impl<S> Clone for NextAction<S> {
    fn clone(&self) -> Self {
        match self {
            NextAction::Forward(action) => NextAction::Forward(action.clone()),
            NextAction::Pending(pending) => NextAction::Pending(pending.clone()),
            NextAction::Success(success) => NextAction::Success(success.clone()),
            NextAction::Failure(failure) => NextAction::Failure(failure.clone()),
        }
    }
}

impl<S> fmt::Debug for NextAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextAction::Forward(action) => f.debug_tuple("Forward").field(action).finish(),
            NextAction::Pending(pending) => f
                .debug_struct("Pending")
                .field("action_type", &pending.action_type)
                .field("request_id", &pending.meta.request_id)
                .finish(),
            NextAction::Success(success) => f
                .debug_struct("Success")
                .field("action_type", &success.action_type)
                .field("payload", &success.payload)
                .field("request_id", &success.meta.request_id)
                .finish(),
            NextAction::Failure(failure) => f
                .debug_struct("Failure")
                .field("action_type", &failure.action_type)
                .field("payload", &failure.payload)
                .field("status", &failure.meta.status)
                .field("request_id", &failure.meta.request_id)
                .finish(),
        }
    }
}

/// `<T>_PENDING`, carrying the original action
pub struct PendingAction<S> {
    pub action_type: String,
    pub payload: Arc<Action<S>>,
    pub meta: PendingMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMeta {
    pub request_id: RequestId,
}

impl<S> PendingAction<S> {
    pub fn new(action: Arc<Action<S>>, request_id: RequestId) -> Self {
        Self {
            action_type: format!("{}{}", action.action_type, PENDING_SUFFIX),
            payload: action,
            meta: PendingMeta { request_id },
        }
    }
}

impl<S> Clone for PendingAction<S> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: Arc::clone(&self.payload),
            meta: self.meta,
        }
    }
}

/// `<T>`, carrying the response body (or the cached value)
pub struct SuccessAction<S> {
    pub action_type: String,
    pub payload: Value,
    pub meta: SuccessMeta<S>,
}

pub struct SuccessMeta<S> {
    pub action: Arc<Action<S>>,
    pub request_id: RequestId,
}

impl<S> SuccessAction<S> {
    pub fn new(action: Arc<Action<S>>, body: Value, request_id: RequestId) -> Self {
        Self {
            action_type: action.action_type.clone(),
            payload: body,
            meta: SuccessMeta { action, request_id },
        }
    }
}

impl<S> Clone for SuccessAction<S> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: self.payload.clone(),
            meta: SuccessMeta {
                action: Arc::clone(&self.meta.action),
                request_id: self.meta.request_id,
            },
        }
    }
}

/// `<T>_FAILURE`, carrying the error
pub struct FailureAction<S> {
    pub action_type: String,
    pub payload: FetchError,
    pub error: bool,
    pub meta: FailureMeta<S>,
}

pub struct FailureMeta<S> {
    pub original_action: Arc<Action<S>>,
    pub request_id: RequestId,
    /// Response status, 500 when no response was received
    pub status: u16,
}

impl<S> FailureAction<S> {
    pub fn new(action: Arc<Action<S>>, error: FetchError, request_id: RequestId) -> Self {
        let status = error.failure_status();
        Self {
            action_type: format!("{}{}", action.action_type, FAILURE_SUFFIX),
            payload: error,
            error: true,
            meta: FailureMeta {
                original_action: action,
                request_id,
                status,
            },
        }
    }
}

impl<S> Clone for FailureAction<S> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: self.payload.clone(),
            error: self.error,
            meta: FailureMeta {
                original_action: Arc::clone(&self.meta.original_action),
                request_id: self.meta.request_id,
                status: self.meta.status,
            },
        }
    }
}
