//! Command handlers

use anyhow::{Context, Result};
use std::io::BufRead;
use tracing::info;

use api_client::ApiClient;
use api_client::models::{LoginRequest, NewComment, NewPost, PageParams, RegisterRequest, UpdateUser};
use common::forms;

use crate::output::Output;

/// Use the given password or read one line from stdin
fn password_or_stdin(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn login(
    client: &ApiClient,
    out: &Output,
    username: String,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_stdin(password)?;
    forms::validate_login(&username, &password)?;

    let session = client.login(&LoginRequest { username, password }).await?;
    info!("Logged in as {}", session.user.username);
    out.user(&session.user);
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    out: &Output,
    username: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = password_or_stdin(password)?;
    forms::validate_registration(&username, &email, &password, &password)?;

    let session = client
        .register(&RegisterRequest {
            username,
            email,
            password,
        })
        .await?;
    out.user(&session.user);
    Ok(())
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    client.logout().await?;
    eprintln!("Logged out.");
    Ok(())
}

pub fn whoami(client: &ApiClient, out: &Output) -> Result<()> {
    match client.current_user()? {
        Some(user) => out.user(&user),
        None => eprintln!("Not logged in."),
    }
    Ok(())
}

pub async fn timeline(client: &ApiClient, out: &Output, offset: u32, limit: u32) -> Result<()> {
    let page = client.timeline(PageParams::new(offset, limit)).await?;
    out.posts(&page);
    Ok(())
}

pub async fn create_post(client: &ApiClient, out: &Output, content: String) -> Result<()> {
    forms::validate_new_post(&content)?;

    let post = client.create_post(&NewPost { content }).await?;
    out.post(&post);
    Ok(())
}

pub async fn show_post(client: &ApiClient, out: &Output, id: i64) -> Result<()> {
    let post = client
        .post(id)
        .await
        .with_context(|| format!("Failed to load post {}", id))?;
    out.post(&post);
    Ok(())
}

pub async fn delete_post(client: &ApiClient, id: i64) -> Result<()> {
    client.delete_post(id).await?;
    eprintln!("Deleted post {}.", id);
    Ok(())
}

pub async fn user_posts(
    client: &ApiClient,
    out: &Output,
    user_id: i64,
    offset: u32,
    limit: u32,
) -> Result<()> {
    let page = client
        .user_posts(user_id, PageParams::new(offset, limit))
        .await?;
    out.posts(&page);
    Ok(())
}

pub async fn comments(
    client: &ApiClient,
    out: &Output,
    post_id: i64,
    offset: u32,
    limit: u32,
) -> Result<()> {
    let page = client
        .comments(post_id, PageParams::new(offset, limit))
        .await?;
    out.comments(&page);
    Ok(())
}

pub async fn add_comment(client: &ApiClient, out: &Output, post_id: i64, content: String) -> Result<()> {
    forms::validate_new_comment(&content)?;

    let comment = client
        .create_comment(post_id, &NewComment { content })
        .await?;
    out.comment(&comment);
    Ok(())
}

pub async fn users(client: &ApiClient, out: &Output, offset: u32, limit: u32) -> Result<()> {
    let page = client.users(PageParams::new(offset, limit)).await?;
    out.users(&page);
    Ok(())
}

pub async fn show_user(client: &ApiClient, out: &Output, id: i64) -> Result<()> {
    let user = client
        .user(id)
        .await
        .with_context(|| format!("Failed to load user {}", id))?;
    out.user(&user);
    Ok(())
}

pub async fn update_profile(
    client: &ApiClient,
    out: &Output,
    username: Option<String>,
    email: Option<String>,
    bio: Option<String>,
) -> Result<()> {
    forms::validate_profile_update(username.as_deref(), email.as_deref(), bio.as_deref())?;

    let Some(me) = client.current_user()? else {
        anyhow::bail!("Not logged in");
    };

    let user = client
        .update_user(
            me.id,
            &UpdateUser {
                username,
                email,
                bio,
            },
        )
        .await?;
    out.user(&user);
    Ok(())
}
