//! Middleware configuration
//!
//! Built once at startup, usually from `FetchDefaults::load()`, and owned by
//! the middleware. The global auth provider is code and cannot come from the
//! config file, so it is attached with `with_auth_provider`.

use crate::action::{Action, AuthSetting};
use crate::error::FetchError;
use crate::headers::HeaderMap;
use fetch_config::{Credentials, FetchDefaults};
use url::Url;

pub struct MiddlewareConfig<S> {
    /// `Enabled` or `Provider` turn auth on for descriptors that don't disable it.
    /// `Inherit` and `Disabled` both mean off.
    pub auth: AuthSetting<S>,
    pub headers: HeaderMap,
    pub credentials: Option<Credentials>,
    pub base_url: Option<Url>,
}

impl<S> MiddlewareConfig<S> {
    pub fn new() -> Self {
        Self {
            auth: AuthSetting::Inherit,
            headers: HeaderMap::new(),
            credentials: None,
            base_url: None,
        }
    }

    pub fn from_defaults(defaults: FetchDefaults) -> Result<Self, FetchError> {
        let base_url = defaults
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            auth: AuthSetting::from(defaults.auth),
            headers: defaults.headers.into(),
            credentials: defaults.credentials,
            base_url,
        })
    }

    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth = AuthSetting::from(enabled);
        self
    }

    /// Global provider, also turns auth on
    pub fn with_auth_provider<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Action<S>) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        self.auth = AuthSetting::provider(f);
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Resolve a descriptor URL, relative ones against `base_url`
    pub fn resolve_url(&self, raw: &str) -> Result<Url, FetchError> {
        let invalid = |e: url::ParseError| FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        };
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => base.join(raw).map_err(invalid),
                None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
            },
            Err(e) => Err(invalid(e)),
        }
    }
}

impl<S> Default for MiddlewareConfig<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for MiddlewareConfig<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("auth", &self.auth)
            .field("headers", &self.headers)
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}
