//! User endpoints

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::models::{PageParams, Paginated, UpdateUser, User};
use crate::transport::ApiRequest;

impl ApiClient {
    /// Get a page of users
    pub async fn users(&self, params: PageParams) -> ClientResult<Paginated<User>> {
        self.send_json(ApiRequest::get("/users").page(params)).await
    }

    /// Get a user by ID
    pub async fn user(&self, id: i64) -> ClientResult<User> {
        self.send_json(ApiRequest::get(format!("/users/{}", id))).await
    }

    /// Update a user's profile
    pub async fn update_user(&self, id: i64, update: &UpdateUser) -> ClientResult<User> {
        self.send_json(ApiRequest::put(format!("/users/{}", id)).json(update)?)
            .await
    }
}
