//! `Transport` backed by reqwest
//!
//! Cookies live in a jar owned by the transport. The credential policy of
//! each request decides whether the jar is consulted and updated.

use crate::action::{FormData, FormValue};
use crate::headers::HeaderMap;
use crate::transport::{FetchRequest, FetchResponse, RequestBody, Transport};
use anyhow::Context;
use async_trait::async_trait;
use fetch_config::Credentials;
use log::debug;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
    origin: Option<Url>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use a preconfigured client (timeouts, proxies, TLS)
    ///
    /// The client should not have its own cookie store; the transport
    /// manages cookies per request.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            jar: Arc::new(Jar::default()),
            origin: None,
        }
    }

    /// Origin that `same-origin` requests must match
    pub fn with_origin(mut self, origin: Option<Url>) -> Self {
        self.origin = origin;
        self
    }

    fn uses_cookies(&self, credentials: Credentials, url: &Url) -> bool {
        match credentials {
            Credentials::Omit => false,
            Credentials::Include => true,
            Credentials::SameOrigin => self
                .origin
                .as_ref()
                .is_some_and(|origin| origin.origin() == url.origin()),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Maps a `FetchRequest` onto reqwest
    ///
    /// Form bodies carry their own multipart content-type with the boundary,
    /// so a caller-set content-type is dropped for them.
    fn build(
        &self,
        request: FetchRequest,
        with_cookies: bool,
    ) -> anyhow::Result<reqwest::Request> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", request.method))?;
        let is_form = matches!(request.body, Some(RequestBody::Form(_)));

        let mut builder = self.client.request(method, request.url.clone());
        for (key, value) in request.headers.iter() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid header name '{}'", key))?;
            if is_form && name == CONTENT_TYPE {
                debug!("dropping content-type '{}' for multipart body", value);
                continue;
            }
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header '{}'", key))?;
            builder = builder.header(name, value);
        }

        if with_cookies && !request.headers.contains_key(COOKIE.as_str()) {
            if let Some(cookies) = self.jar.cookies(&request.url) {
                builder = builder.header(COOKIE, cookies);
            }
        }

        builder = match request.body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Form(form)) => builder.multipart(to_multipart(form)?),
            None => builder,
        };

        builder
            .build()
            .with_context(|| format!("failed to build request to {}", request.url))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
        let with_cookies = self.uses_cookies(request.credentials, &request.url);
        let target = request.url.clone();
        let request = self.build(request, with_cookies)?;

        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("request to {} failed", target))?;

        if with_cookies {
            let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
            self.jar.set_cookies(&mut set_cookies, response.url());
        }

        let url = response.url().to_string();
        let status = response.status();
        let headers: HeaderMap = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body from {}", url))?;

        debug!("{} {} ({} bytes)", status.as_u16(), url, body.len());

        Ok(FetchResponse {
            url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

fn to_multipart(form: FormData) -> anyhow::Result<Form> {
    let mut multipart = Form::new();
    for part in form.parts {
        multipart = match part.value {
            FormValue::Text(text) => multipart.text(part.name, text),
            FormValue::File {
                filename,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes.to_vec()).file_name(filename);
                if let Some(mime) = mime {
                    file = file
                        .mime_str(&mime)
                        .with_context(|| format!("invalid mime type '{}'", mime))?;
                }
                multipart.part(part.name, file)
            }
        };
    }
    Ok(multipart)
}
