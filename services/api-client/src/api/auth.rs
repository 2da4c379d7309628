//! Authentication endpoints

use common::session::Session;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::models::{AuthPayload, LoginRequest, RefreshTokenRequest, RegisterRequest, User};
use crate::transport::ApiRequest;

impl ApiClient {
    /// Log in and persist the new session
    pub async fn login(&self, credentials: &LoginRequest) -> ClientResult<Session> {
        info!("Login attempt for user: {}", credentials.username);

        let request = ApiRequest::post("/auth/login").anonymous().json(credentials)?;
        self.start_session(request).await
    }

    /// Create an account and persist the new session
    pub async fn register(&self, account: &RegisterRequest) -> ClientResult<Session> {
        info!("Registering user: {}", account.username);

        let request = ApiRequest::post("/auth/register").anonymous().json(account)?;
        self.start_session(request).await
    }

    async fn start_session(&self, request: ApiRequest) -> ClientResult<Session> {
        let payload: AuthPayload = self.send_json(request).await?;
        let session = Session::from(payload);
        self.sessions().save(&session)?;

        info!("Session started for user: {}", session.user.id);
        Ok(session)
    }

    /// Log out.
    ///
    /// The server is told to revoke the refresh token when one is stored; the
    /// local session is cleared whatever the server answers. An expired access
    /// token is not refreshed for this call.
    pub async fn logout(&self) -> ClientResult<()> {
        let Some(session) = self.session()? else {
            return Ok(());
        };

        if let Some(refresh_token) = session.refresh_token {
            let request = ApiRequest::post("/auth/logout")
                .without_refresh()
                .json(&RefreshTokenRequest { refresh_token })?;
            if let Err(e) = self.send(request).await {
                warn!("Server-side logout failed: {}", e);
            }
        }

        self.sessions().clear()?;
        info!("Logged out user: {}", session.user.id);
        Ok(())
    }

    /// The signed-in user, from the stored session
    pub fn current_user(&self) -> ClientResult<Option<User>> {
        Ok(self.session()?.map(|session| session.user))
    }
}
