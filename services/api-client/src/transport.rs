//! HTTP transport
//!
//! The transport sends one request and reports the outcome as a typed
//! result: `Ok` for 2xx answers, [`ClientError::Http`] for every other status,
//! [`ClientError::Network`] when no answer arrived. It knows nothing about
//! sessions or refreshing; that is the pipeline's job.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::models::PageParams;

/// How a request authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAuth {
    /// Attach the session's bearer token and recover from a 401 by refreshing
    Bearer,
    /// Attach the session's bearer token; a 401 is returned to the caller untouched
    BearerOnly,
    /// Send without credentials; a 401 is returned to the caller untouched
    Anonymous,
}

/// An outbound API request, relative to the configured base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the configured request timeout
    pub timeout: Option<Duration>,
    pub auth: RequestAuth,
}

impl ApiRequest {
    /// Create a new authenticated request
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            auth: RequestAuth::Bearer,
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

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ClientResult<Self> {
        self.body = Some(serde_json::to_value(body).map_err(ClientError::Json)?);
        Ok(self)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append the set pagination parameters
    pub fn page(self, params: PageParams) -> Self {
        params
            .to_query()
            .into_iter()
            .fold(self, |request, (key, value)| request.query(key, value))
    }

    /// Set a deadline for this request, covering any wait for a token refresh
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send without credentials
    pub fn anonymous(mut self) -> Self {
        self.auth = RequestAuth::Anonymous;
        self
    }

    /// Attach the bearer token but never refresh it on a 401
    pub fn without_refresh(mut self) -> Self {
        self.auth = RequestAuth::BearerOnly;
        self
    }
}

/// A successful response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl HttpResponse {
    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(self) -> ClientResult<T> {
        serde_json::from_value(self.body.unwrap_or(Value::Null)).map_err(ClientError::Json)
    }
}

/// Sends a single request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, with `bearer` as the `Authorization: Bearer` token when given
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ClientResult<HttpResponse>;
}

/// Transport over HTTPS using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a new transport for `base_url`
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chirp-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport reusing an existing reqwest client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Parse a response body. Non-JSON text is kept as a JSON string.
fn parse_body(text: String) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }

    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> ClientResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        // Timeouts while sending or reading the body both become `Timeout`
        let response = builder.send().await?;

        let status = response.status();
        let body = parse_body(response.text().await?);

        if status.is_success() {
            Ok(HttpResponse { status, body })
        } else {
            Err(ClientError::Http { status, body })
        }
    }
}
