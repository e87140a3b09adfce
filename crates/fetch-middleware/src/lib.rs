//! Fetch middleware for action dispatch pipelines
//!
//! Application code attaches a declarative `FetchDescriptor` to an action.
//! The middleware performs the request and forwards lifecycle actions
//! (`<T>_PENDING`, `<T>`, `<T>_FAILURE`) to the next stage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌──────────────┐
//! │  dispatch()  │──►│   FetchHandler      │──►│  next stage  │
//! └──────────────┘   │  cache / auth /     │   │ (Dispatcher) │
//!                    │  headers / body     │   └──────────────┘
//!                    └─────────┬───────────┘
//!                              ▼
//!                    ┌─────────────────────┐
//!                    │  Transport trait    │
//!                    │  (ReqwestTransport) │
//!                    └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use fetch_middleware::{
//!     fetch_middleware, Action, Dispatcher, FetchDefaults, FetchDescriptor, MiddlewareConfig,
//! };
//!
//! #[derive(Clone, Default)]
//! struct AppState {
//!     token: Option<String>,
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MiddlewareConfig::from_defaults(FetchDefaults::load())?
//!     .with_auth_provider(|state: &AppState, _| {
//!         Ok(state.token.as_ref().map(|t| format!("Bearer {}", t)))
//!     });
//!
//! let (dispatcher, mut rx) = Dispatcher::channel();
//! let handler = fetch_middleware(config)
//!     .bind(AppState::default)
//!     .with_next(dispatcher.as_next());
//!
//! let action = Action::new("LOAD_USERS").with_fetch(FetchDescriptor::get("/users"));
//! if let Some(handle) = handler.handle(action).into_fetch() {
//!     let users = handle.await?;
//!     println!("{}", users);
//! }
//! while let Ok(forwarded) = rx.try_recv() {
//!     println!("{}", forwarded.action_type());
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod reqwest_transport;
pub mod transport;

pub use action::{
    Action, AuthFn, AuthSetting, CacheFn, FailureAction, FetchDescriptor, FormData, FormPart,
    FormValue, NextAction, Payload, PendingAction, RequestId, SuccessAction,
};
pub use config::MiddlewareConfig;
pub use dispatcher::Dispatcher;
pub use error::{FetchError, RequestError};
pub use headers::HeaderMap;
pub use middleware::{
    fetch_middleware, BoundInterceptor, FetchHandle, FetchHandler, Handled, RequestInterceptor,
};
pub use reqwest_transport::ReqwestTransport;
pub use transport::{FetchRequest, FetchResponse, RequestBody, ResponseInfo, Transport};

// Re-export config types so consumers don't need to depend on fetch-config directly
pub use fetch_config::{Credentials, FetchDefaults};
