//! Timeline, post and comment endpoints

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::models::{Comment, NewComment, NewPost, PageParams, Paginated, Post};
use crate::transport::ApiRequest;

impl ApiClient {
    /// Get a page of the timeline
    pub async fn timeline(&self, params: PageParams) -> ClientResult<Paginated<Post>> {
        self.send_json(ApiRequest::get("/timeline").page(params)).await
    }

    /// Create a new post
    pub async fn create_post(&self, post: &NewPost) -> ClientResult<Post> {
        self.send_json(ApiRequest::post("/posts").json(post)?).await
    }

    /// Get a post by ID
    pub async fn post(&self, id: i64) -> ClientResult<Post> {
        self.send_json(ApiRequest::get(format!("/posts/{}", id))).await
    }

    /// Delete a post
    pub async fn delete_post(&self, id: i64) -> ClientResult<()> {
        self.send(ApiRequest::delete(format!("/posts/{}", id))).await?;
        Ok(())
    }

    /// Get a page of a user's posts
    pub async fn user_posts(&self, user_id: i64, params: PageParams) -> ClientResult<Paginated<Post>> {
        self.send_json(ApiRequest::get(format!("/posts/user/{}", user_id)).page(params))
            .await
    }

    /// Get a page of comments on a post
    pub async fn comments(&self, post_id: i64, params: PageParams) -> ClientResult<Paginated<Comment>> {
        self.send_json(ApiRequest::get(format!("/posts/{}/comments", post_id)).page(params))
            .await
    }

    /// Comment on a post
    pub async fn create_comment(&self, post_id: i64, comment: &NewComment) -> ClientResult<Comment> {
        self.send_json(ApiRequest::post(format!("/posts/{}/comments", post_id)).json(comment)?)
            .await
    }
}
