//! HTTP plumbing between the entity access layer and the REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::TransportError;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add `?search=` only when the term is non-blank.
    pub fn search(self, term: Option<&str>) -> Self {
        match term.map(str::trim).filter(|term| !term.is_empty()) {
            Some(term) => self.query("search", term),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends one request and yields the decoded JSON body of a 2xx response.
///
/// Non-2xx responses come back as [`TransportError::Status`] with the body attached.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpTransport {
    pub fn new(config: &AppConfig, session: Session) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::with_client(client, config.api_url(), session))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, session: Session) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.url(&request.path);
        tracing::debug!(method = %request.method, url = %url, "api request");

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        match self.session.bearer_token() {
            Some(token) => builder = builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => tracing::trace!("no token available, sending unauthenticated request"),
        }

        let response = builder.send().await.map_err(|err| {
            tracing::warn!(url = %url, error = %err, "api request failed without a response");
            TransportError::from(err)
        })?;

        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) if !status.is_success() => Value::String(text),
                Err(err) => return Err(TransportError::Decode(err.to_string())),
            }
        };

        if status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "api response");
            return Ok(body);
        }

        let code = status.as_u16();
        match code {
            401 => tracing::warn!(url = %url, "unauthorized, token may be invalid or expired"),
            404 => tracing::debug!(url = %url, "resource not found"),
            422 => tracing::debug!(url = %url, errors = %body.get("errors").unwrap_or(&serde_json::Value::Null), "validation failed"),
            500.. => tracing::error!(url = %url, status = code, "server error"),
            _ => tracing::warn!(url = %url, status = code, "api error"),
        }
        Err(TransportError::Status { status: code, body })
    }
}
