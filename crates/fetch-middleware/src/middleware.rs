//! Fetch middleware
//!
//! Turns actions carrying a `FetchDescriptor` into HTTP requests and forwards
//! lifecycle actions to the next stage:
//!
//! ```text
//! Action (no fetch) ──────────────────────────────► next(Forward)
//! Action (cache hit) ─────────────────────────────► next(Success)
//! Action (network) ──► next(Pending) ──► request ─┬► next(Success)
//!                                                 └► next(Failure)
//! ```
//!
//! The layers mirror the classic middleware shape: `fetch_middleware(config)`
//! builds the interceptor, `bind` attaches the state accessor, `with_next`
//! (or `with_async_next` for a stage returning futures) attaches the next
//! stage and yields the handler.

use crate::action::{
    Action, AuthSetting, FailureAction, FetchDescriptor, NextAction, Payload, PendingAction,
    RequestId, SuccessAction,
};
use crate::config::MiddlewareConfig;
use crate::error::{FetchError, RequestError};
use crate::headers::HeaderMap;
use crate::reqwest_transport::ReqwestTransport;
use crate::transport::{FetchRequest, RequestBody, Transport};
use futures::future::{self, BoxFuture};
use log::{debug, info, warn};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

const APPLICATION_JSON: &str = "application/json";
const AUTHORIZATION: &str = "authorization";
const ACCEPT: &str = "accept";
const CONTENT_TYPE: &str = "content-type";

/// Build the middleware from its configuration
pub fn fetch_middleware<S>(config: MiddlewareConfig<S>) -> RequestInterceptor<S> {
    RequestInterceptor::new(config)
}

/// Configured middleware, not yet attached to a store
pub struct RequestInterceptor<S> {
    config: Arc<MiddlewareConfig<S>>,
    transport: Arc<dyn Transport>,
}

impl<S> RequestInterceptor<S> {
    /// Uses a `ReqwestTransport` whose same-origin check follows `config.base_url`
    pub fn new(config: MiddlewareConfig<S>) -> Self {
        let transport = ReqwestTransport::new().with_origin(config.base_url.clone());
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    pub fn with_shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Attach the state accessor handed to cache and auth functions
    pub fn bind<G>(&self, get_state: G) -> BoundInterceptor<S>
    where
        G: Fn() -> S + Send + Sync + 'static,
    {
        BoundInterceptor {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            get_state: Arc::new(get_state),
        }
    }
}

pub struct BoundInterceptor<S> {
    config: Arc<MiddlewareConfig<S>>,
    transport: Arc<dyn Transport>,
    get_state: Arc<dyn Fn() -> S + Send + Sync>,
}

impl<S> BoundInterceptor<S> {
    /// Attach a synchronous next stage, producing the action handler
    ///
    /// What the stage returns for lifecycle actions is dropped. A stage that
    /// returns a future must go through [`with_async_next`](Self::with_async_next).
    pub fn with_next<N, R>(&self, next: N) -> FetchHandler<S, R>
    where
        N: Fn(NextAction<S>) -> R + Send + Sync + 'static,
    {
        self.handler(NextStage {
            call: Arc::new(next),
            settle: Arc::new(|_: R| -> BoxFuture<'static, ()> {
                Box::pin(future::ready(()))
            }),
        })
    }

    /// Attach a future-returning next stage
    ///
    /// Each lifecycle future is awaited inside the fetch: pending completes
    /// before the terminal action is forwarded, and the handle resolves only
    /// after the terminal future has completed. Pass-through actions return
    /// the stage's future unawaited.
    pub fn with_async_next<N, F>(&self, next: N) -> FetchHandler<S, F>
    where
        N: Fn(NextAction<S>) -> F + Send + Sync + 'static,
        F: Future + Send + 'static,
    {
        self.handler(NextStage {
            call: Arc::new(next),
            settle: Arc::new(|stage: F| -> BoxFuture<'static, ()> {
                Box::pin(async move {
                    let _ = stage.await;
                })
            }),
        })
    }

    fn handler<R>(&self, next: NextStage<S, R>) -> FetchHandler<S, R> {
        FetchHandler {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            get_state: Arc::clone(&self.get_state),
            next,
        }
    }
}

/// The next stage and how to wait on what it returns
struct NextStage<S, R> {
    call: Arc<dyn Fn(NextAction<S>) -> R + Send + Sync>,
    settle: Arc<dyn Fn(R) -> BoxFuture<'static, ()> + Send + Sync>,
}

impl<S, R> NextStage<S, R> {
    fn call(&self, action: NextAction<S>) -> R {
        (self.call)(action)
    }

    /// Calls the stage now; the returned future completes with its work
    fn forward(&self, action: NextAction<S>) -> BoxFuture<'static, ()> {
        (self.settle)((self.call)(action))
    }
}

impl<S, R> Clone for NextStage<S, R> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
            settle: Arc::clone(&self.settle),
        }
    }
}

/// Result of handling one action
pub enum Handled<R> {
    /// No fetch descriptor: whatever the next stage returned
    Forwarded(R),
    /// Cached or in-flight fetch
    Fetch(FetchHandle),
}

impl<R> Handled<R> {
    pub fn forwarded(self) -> Option<R> {
        match self {
            Handled::Forwarded(value) => Some(value),
            Handled::Fetch(_) => None,
        }
    }

    pub fn into_fetch(self) -> Option<FetchHandle> {
        match self {
            Handled::Fetch(handle) => Some(handle),
            Handled::Forwarded(_) => None,
        }
    }
}

/// Resolves with the body once the terminal action has been forwarded
///
/// When a tokio runtime is available the request runs on a spawned task, so
/// dropping the handle does not cancel it.
pub struct FetchHandle {
    request_id: RequestId,
    inner: BoxFuture<'static, Result<Value, FetchError>>,
}

impl FetchHandle {
    fn ready(request_id: RequestId, result: Result<Value, FetchError>) -> Self {
        Self {
            request_id,
            inner: Box::pin(future::ready(result)),
        }
    }

    /// Spawns `task` on the current tokio runtime, or runs it when polled
    fn schedule<T>(request_id: RequestId, task: T) -> Self
    where
        T: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let inner: BoxFuture<'static, Result<Value, FetchError>> =
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let join = runtime.spawn(task);
                    Box::pin(async move {
                        match join.await {
                            Ok(result) => result,
                            Err(e) => Err(FetchError::Aborted(e.to_string())),
                        }
                    })
                }
                Err(_) => {
                    debug!("no tokio runtime, fetch runs when the handle is polled");
                    Box::pin(task)
                }
            };
        Self { request_id, inner }
    }

    /// Id shared with the pending and terminal actions of this fetch
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

impl Future for FetchHandle {
    type Output = Result<Value, FetchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Handles actions for one pipeline
pub struct FetchHandler<S, R> {
    config: Arc<MiddlewareConfig<S>>,
    transport: Arc<dyn Transport>,
    get_state: Arc<dyn Fn() -> S + Send + Sync>,
    next: NextStage<S, R>,
}

impl<S, R> Clone for FetchHandler<S, R> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            get_state: Arc::clone(&self.get_state),
            next: self.next.clone(),
        }
    }
}

enum Resolution {
    Cached(Value),
    Request(FetchRequest),
}

impl<S, R> FetchHandler<S, R>
where
    S: Send + Sync + 'static,
    R: Send + 'static,
{
    /// Handle one action
    ///
    /// For network fetches the next stage has been called with the pending
    /// action by the time this returns. Errors from cache or auth functions
    /// and invalid URLs reject the handle without forwarding anything.
    pub fn handle(&self, action: Action<S>) -> Handled<R> {
        if action.fetch.is_none() {
            return Handled::Forwarded(self.next.call(NextAction::Forward(action)));
        }

        let action = Arc::new(action);
        let request_id = RequestId::new();
        let state = (self.get_state)();

        let request = match self.resolve(&state, &action) {
            Ok(Resolution::Cached(body)) => {
                debug!("retrieved value from cache for {}", action.action_type);
                let forwarded = self.next.forward(NextAction::Success(SuccessAction::new(
                    Arc::clone(&action),
                    body.clone(),
                    request_id,
                )));
                return Handled::Fetch(FetchHandle::schedule(request_id, async move {
                    forwarded.await;
                    Ok(body)
                }));
            }
            Ok(Resolution::Request(request)) => request,
            Err(err) => return Handled::Fetch(FetchHandle::ready(request_id, Err(err))),
        };

        let label = format!("{} :: {}", request.method, request.url);
        info!("PENDING: {}", label);
        let pending = self.next.forward(NextAction::Pending(PendingAction::new(
            Arc::clone(&action),
            request_id,
        )));

        let task = complete(
            Arc::clone(&self.transport),
            self.next.clone(),
            pending,
            action,
            request,
            request_id,
            label,
        );

        Handled::Fetch(FetchHandle::schedule(request_id, task))
    }

    fn resolve(&self, state: &S, action: &Action<S>) -> Result<Resolution, FetchError> {
        let Some(descriptor) = action.fetch.as_ref() else {
            return Err(FetchError::MissingUrl {
                action_type: action.action_type.clone(),
            });
        };

        if let Some(cache) = &descriptor.cache {
            let cached = cache(state, action).map_err(|e| FetchError::Cache(Arc::new(e)))?;
            if let Some(body) = cached.filter(is_truthy) {
                return Ok(Resolution::Cached(body));
            }
        }

        self.build_request(state, action, descriptor)
            .map(Resolution::Request)
    }

    fn build_request(
        &self,
        state: &S,
        action: &Action<S>,
        descriptor: &FetchDescriptor<S>,
    ) -> Result<FetchRequest, FetchError> {
        let raw_url = descriptor
            .url
            .as_deref()
            .ok_or_else(|| FetchError::MissingUrl {
                action_type: action.action_type.clone(),
            })?;
        let url = self.config.resolve_url(raw_url)?;

        let auth_headers = self.auth_headers(state, action, descriptor)?;
        let mut request = FetchRequest {
            url,
            method: descriptor.method_or_default().to_string(),
            headers: HeaderMap::merge([&auth_headers, &self.config.headers, &descriptor.headers]),
            credentials: descriptor
                .credentials
                .or(self.config.credentials)
                .unwrap_or_default(),
            body: None,
        };

        if !request.is_get() {
            if let Some(payload) = action.body_payload() {
                request.body = Some(encode_body(payload, &mut request.headers));
            }
        }

        Ok(request)
    }

    /// Authorization header, if auth applies and a provider yields a value
    ///
    /// Auth applies unless the descriptor disables it, and only when the
    /// descriptor or the global config turns it on. The descriptor's provider
    /// wins over the global one.
    fn auth_headers(
        &self,
        state: &S,
        action: &Action<S>,
        descriptor: &FetchDescriptor<S>,
    ) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        if matches!(descriptor.auth, AuthSetting::Disabled)
            || !(descriptor.auth.is_truthy() || self.config.auth.is_truthy())
        {
            return Ok(headers);
        }

        let provider = descriptor
            .auth
            .as_provider()
            .or_else(|| self.config.auth.as_provider());
        if let Some(provider) = provider {
            debug!("applying auth header");
            let value = provider(state, action).map_err(|e| FetchError::Auth(Arc::new(e)))?;
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }
}

/// Request body for a non-GET fetch, adjusting `accept` and `content-type`
///
/// Forms leave content-type to the transport so it can add the boundary.
/// Other payloads default to JSON and are serialized only when the
/// content-type is exactly `application/json`.
fn encode_body(payload: &Payload, headers: &mut HeaderMap) -> RequestBody {
    if headers.get(ACCEPT).map_or(true, str::is_empty) {
        headers.insert(ACCEPT, APPLICATION_JSON);
    }
    if headers.get(CONTENT_TYPE).map_or(true, str::is_empty) {
        if payload.is_form() {
            headers.remove(CONTENT_TYPE);
        } else {
            headers.insert(CONTENT_TYPE, APPLICATION_JSON);
        }
    }

    match (headers.get(CONTENT_TYPE), payload) {
        (_, Payload::Form(form)) => RequestBody::Form(form.clone()),
        (Some(APPLICATION_JSON), Payload::Json(value)) => RequestBody::Text(value.to_string()),
        (Some(APPLICATION_JSON), Payload::Text(text)) => {
            RequestBody::Text(Value::String(text.clone()).to_string())
        }
        (_, Payload::Json(Value::String(text))) | (_, Payload::Text(text)) => {
            RequestBody::Text(text.clone())
        }
        (_, Payload::Json(value)) => RequestBody::Text(value.to_string()),
    }
}

/// Runs the request and forwards the terminal action
///
/// The request runs alongside the pending stage; the terminal action is
/// forwarded only once both are done.
async fn complete<S, R>(
    transport: Arc<dyn Transport>,
    next: NextStage<S, R>,
    pending: BoxFuture<'static, ()>,
    action: Arc<Action<S>>,
    request: FetchRequest,
    request_id: RequestId,
    label: String,
) -> Result<Value, FetchError>
where
    S: Send + Sync + 'static,
    R: Send + 'static,
{
    let ((), result) = futures::join!(pending, execute(transport.as_ref(), request));

    match result {
        Ok(body) => {
            info!("{}", label);
            next.forward(NextAction::Success(SuccessAction::new(
                action,
                body.clone(),
                request_id,
            )))
            .await;
            Ok(body)
        }
        Err(err) => {
            warn!("FAILURE: {} ({})", label, err.failure_status());
            if forwards_failure(&err) {
                next.forward(NextAction::Failure(FailureAction::new(
                    action,
                    err.clone(),
                    request_id,
                )))
                .await;
            }
            Err(err)
        }
    }
}

async fn execute(transport: &dyn Transport, request: FetchRequest) -> Result<Value, FetchError> {
    let response = transport
        .send(request)
        .await
        .map_err(FetchError::transport)?;

    let body = response
        .json()
        .map_err(|e| FetchError::body_parse(response.status, e))?;

    if response.is_success() {
        return Ok(body);
    }

    Err(RequestError {
        status: response.status,
        status_text: response.status_text.clone(),
        response: response.info(),
        body,
    }
    .into())
}

/// Body parse failures reject the handle without a failure action
fn forwards_failure(err: &FetchError) -> bool {
    matches!(err, FetchError::Request(_) | FetchError::Transport(_))
}

/// JS truthiness, a falsy cached value counts as a miss
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
