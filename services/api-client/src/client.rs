//! Authenticated request pipeline
//!
//! Every request goes through [`ApiClient::send`]:
//!
//! 1. the current access token is read from session storage and attached;
//! 2. the request is sent through the [`Transport`];
//! 3. a 401 on an authenticated request triggers one recovery: the token is
//!    refreshed (or the in-flight refresh awaited) and the request replayed
//!    once with the new token;
//! 4. failures are normalized so validation payloads surface as
//!    [`ClientError::Validation`].
//!
//! When the session cannot be recovered it is destroyed and the
//! [`LoginRedirect`] is invoked.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, info, warn};
use uuid::Uuid;

use common::session::Session;
use common::storage::{FileStore, SessionStorage};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{Envelope, RefreshTokenRequest, RefreshTokenResponse};
use crate::redirect::{LogRedirect, LoginRedirect};
use crate::refresh::{RefreshCoordinator, RefreshFailure, Ticket};
use crate::transport::{ApiRequest, HttpResponse, ReqwestTransport, RequestAuth, Transport};

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/auth/refresh";

/// How many times a request may be replayed after a 401
const MAX_REPLAYS: u8 = 1;

/// How to answer a 401
enum Recovery {
    /// The stored token already changed; replay with it
    Replay(String),
    /// The rejected token is still current; refresh with this refresh token
    Refresh(String),
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sessions: SessionStorage,
    refresh: RefreshCoordinator,
    redirect: Arc<dyn LoginRedirect>,
}

/// API client with bearer authentication and transparent token refresh.
///
/// Cloning is cheap; clones share the session and the refresh state.
///
/// # Examples
///
/// ```rust,no_run
/// use api_client::{ApiClient, ClientConfig};
/// use api_client::models::LoginRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::builder()
///     .config(ClientConfig::default().with_base_url("http://localhost:3000/api"))
///     .build()?;
///
/// client
///     .login(&LoginRequest {
///         username: "jane".to_string(),
///         password: "Str0ng!pass".to_string(),
///     })
///     .await?;
///
/// let timeline = client.timeline(Default::default()).await?;
/// println!("{} posts", timeline.items.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session storage used by this client
    pub fn sessions(&self) -> &SessionStorage {
        &self.inner.sessions
    }

    /// The current session, if any
    pub fn session(&self) -> ClientResult<Option<Session>> {
        Ok(self.inner.sessions.load()?)
    }

    /// Whether a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Number of requests waiting on the in-flight refresh
    pub fn pending_refreshes(&self) -> usize {
        self.inner.refresh.pending_len()
    }

    /// Send a request through the pipeline
    pub async fn send(&self, request: ApiRequest) -> ClientResult<HttpResponse> {
        let span = debug_span!(
            "api_request",
            id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );

        self.dispatch(&request)
            .instrument(span)
            .await
            .map_err(ClientError::normalized)
    }

    /// Send a request and decode the `data` field of its envelope
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let envelope: Envelope<T> = self.send(request).await?.json()?;
        Ok(envelope.data)
    }

    async fn dispatch(&self, request: &ApiRequest) -> ClientResult<HttpResponse> {
        let deadline =
            Instant::now() + request.timeout.unwrap_or(self.inner.config.request_timeout);

        let mut bearer = match request.auth {
            RequestAuth::Bearer | RequestAuth::BearerOnly => self.inner.sessions.access_token()?,
            RequestAuth::Anonymous => None,
        };
        let mut attempt: u8 = 0;

        loop {
            let result = self.execute(request, bearer.as_deref(), deadline).await;
            match result {
                Err(err)
                    if err.is_unauthorized()
                        && request.auth == RequestAuth::Bearer
                        && attempt < MAX_REPLAYS =>
                {
                    attempt += 1;
                    let token = self.recover(bearer.as_deref(), err, deadline).await?;
                    debug!("Replaying request (attempt {})", attempt);
                    bearer = Some(token);
                }
                other => return other,
            }
        }
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        deadline: Instant,
    ) -> ClientResult<HttpResponse> {
        tokio::time::timeout_at(deadline, self.inner.transport.execute(request, bearer))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    /// Obtain a token to replay a request that was rejected with 401.
    ///
    /// `sent_with` is the token the rejected request carried and
    /// `unauthorized` its error, returned when the refresh is abandoned.
    async fn recover(
        &self,
        sent_with: Option<&str>,
        unauthorized: ClientError,
        deadline: Instant,
    ) -> ClientResult<String> {
        if let Recovery::Replay(token) = self.plan_recovery(sent_with)? {
            return Ok(token);
        }

        match self.inner.refresh.acquire_or_queue() {
            Ticket::Queued(queued) => match queued.wait_until(deadline).await? {
                Ok(token) => Ok(token),
                Err(RefreshFailure::Rejected) => Err(ClientError::SessionExpired),
                Err(RefreshFailure::Abandoned) => Err(unauthorized),
            },
            Ticket::Leader(lease) => {
                // A refresh may have settled between the first read and the lease
                let refresh_token = match self.plan_recovery(sent_with) {
                    Ok(Recovery::Refresh(refresh_token)) => refresh_token,
                    Ok(Recovery::Replay(token)) => {
                        lease.settle(Ok(token.clone()));
                        return Ok(token);
                    }
                    Err(ClientError::SessionExpired) => {
                        lease.settle(Err(RefreshFailure::Rejected));
                        return Err(ClientError::SessionExpired);
                    }
                    Err(e) => return Err(e),
                };

                info!("Access token rejected, refreshing");

                match self.refresh_tokens(&refresh_token).await {
                    Ok(tokens) => {
                        self.inner
                            .sessions
                            .update_tokens(&tokens.access_token, tokens.refresh_token.as_deref())?;
                        let woken = lease.settle(Ok(tokens.access_token.clone()));
                        info!("Access token refreshed, resuming {} queued request(s)", woken);
                        Ok(tokens.access_token)
                    }
                    Err(err) => {
                        warn!("Token refresh failed: {}", err);
                        let teardown = self.expire_session();
                        let woken = lease.settle(Err(RefreshFailure::Rejected));
                        info!("Rejected {} queued request(s) after failed refresh", woken);
                        teardown?;
                        Err(ClientError::SessionExpired)
                    }
                }
            }
        }
    }

    /// Decide from the stored session how to recover from a 401 on `sent_with`
    fn plan_recovery(&self, sent_with: Option<&str>) -> ClientResult<Recovery> {
        let Some(session) = self.inner.sessions.load()? else {
            if sent_with.is_none() {
                self.expire_session()?;
            }
            // Otherwise another request already destroyed the session
            return Err(ClientError::SessionExpired);
        };

        if sent_with != Some(session.access_token.as_str()) {
            debug!("Access token rotated while the request was in flight");
            return Ok(Recovery::Replay(session.access_token));
        }

        match session.refresh_token {
            Some(refresh_token) => Ok(Recovery::Refresh(refresh_token)),
            None => {
                warn!("Access token rejected and no refresh token stored, ending session");
                self.expire_session()?;
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Call the refresh endpoint directly, outside the pipeline
    async fn refresh_tokens(&self, refresh_token: &str) -> ClientResult<RefreshTokenResponse> {
        let request = ApiRequest::post(REFRESH_PATH)
            .anonymous()
            .json(&RefreshTokenRequest {
                refresh_token: refresh_token.to_string(),
            })?;

        let response = tokio::time::timeout(
            self.inner.config.refresh_timeout,
            self.inner.transport.execute(&request, None),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;

        let envelope: Envelope<RefreshTokenResponse> = response.json()?;
        Ok(envelope.data)
    }

    /// Destroy the session and send the user back to login
    fn expire_session(&self) -> ClientResult<()> {
        let cleared = self.inner.sessions.clear();
        self.inner.redirect.redirect_to_login();
        Ok(cleared?)
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    sessions: Option<SessionStorage>,
    redirect: Option<Arc<dyn LoginRedirect>>,
}

impl ApiClientBuilder {
    /// Use `config` instead of [`ClientConfig::default`]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Send requests through `transport` instead of reqwest
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist the session in `sessions`
    pub fn sessions(mut self, sessions: SessionStorage) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Invoke `redirect` whenever the session is destroyed
    pub fn redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Build the client.
    ///
    /// Without explicit storage the session goes to the configured session
    /// file, or stays in memory when none is configured.
    pub fn build(self) -> ClientResult<ApiClient> {
        let config = self.config.unwrap_or_default();

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.base_url.clone())?),
        };

        let sessions = match (self.sessions, &config.session_file) {
            (Some(sessions), _) => sessions,
            (None, Some(path)) => SessionStorage::new(Arc::new(FileStore::new(path))),
            (None, None) => SessionStorage::in_memory(),
        };

        let redirect = self.redirect.unwrap_or_else(|| Arc::new(LogRedirect));

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config,
                transport,
                sessions,
                refresh: RefreshCoordinator::new(),
                redirect,
            }),
        })
    }
}
