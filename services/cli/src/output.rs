//! Terminal rendering of API payloads and errors

use anyhow::Error;
use serde::Serialize;

use api_client::models::{Comment, Paginated, Post, User};
use api_client::{ClientError, describe, to_validation_error};
use common::ValidationError;

/// Prints results either as text or as pretty JSON
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to encode output: {}", e),
            }
        } else {
            println!("{}", text(value));
        }
    }

    pub fn user(&self, user: &User) {
        self.print(user, |user| format!("@{} <{}> (id {})", user.username, user.email, user.id));
    }

    pub fn users(&self, page: &Paginated<User>) {
        self.print(page, |page| {
            let mut lines: Vec<String> = page
                .items
                .iter()
                .map(|user| format!("{:>6}  @{}", user.id, user.username))
                .collect();
            lines.push(footer(page));
            lines.join("\n")
        });
    }

    pub fn post(&self, post: &Post) {
        self.print(post, render_post);
    }

    pub fn posts(&self, page: &Paginated<Post>) {
        self.print(page, |page| {
            let mut lines: Vec<String> = page.items.iter().map(render_post).collect();
            lines.push(footer(page));
            lines.join("\n\n")
        });
    }

    pub fn comment(&self, comment: &Comment) {
        self.print(comment, render_comment);
    }

    pub fn comments(&self, page: &Paginated<Comment>) {
        self.print(page, |page| {
            let mut lines: Vec<String> = page.items.iter().map(render_comment).collect();
            lines.push(footer(page));
            lines.join("\n")
        });
    }
}

fn render_post(post: &Post) -> String {
    format!(
        "#{} @{} · {}\n{}",
        post.id,
        post.username,
        post.created_at.format("%Y-%m-%d %H:%M"),
        post.content
    )
}

fn render_comment(comment: &Comment) -> String {
    format!("@{}: {}", comment.username, comment.content)
}

fn footer<T>(page: &Paginated<T>) -> String {
    let shown = page.pagination.offset as usize + page.items.len();
    if page.has_more() {
        format!(
            "({} of {}, next: --offset {})",
            shown, page.pagination.total, shown
        )
    } else {
        format!("({} of {})", shown, page.pagination.total)
    }
}

/// The validation error anywhere in the chain of `err`
fn find_validation_error(err: &Error) -> Option<ValidationError> {
    err.chain().find_map(|cause| {
        if let Some(client_error) = cause.downcast_ref::<ClientError>() {
            return to_validation_error(client_error);
        }
        cause.downcast_ref::<ValidationError>().cloned()
    })
}

/// Print `err` to stderr, listing field issues for validation failures
pub fn report(err: &Error) {
    if let Some(validation) = find_validation_error(err) {
        eprintln!("Error: {}", validation.message);
        for (field, issues) in validation.group_by_field() {
            let messages: Vec<&str> = issues.iter().map(|issue| issue.message.as_str()).collect();
            eprintln!("  {}: {}", field, messages.join(", "));
        }
        return;
    }

    let source: &(dyn std::error::Error + 'static) = err.as_ref();
    eprintln!("Error: {}", describe(source));
}
