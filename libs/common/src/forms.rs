//! Input validation for client forms
//!
//! Field checks run before a request is sent and report problems as a
//! canonical [`ValidationError`], the same shape the server uses.

use regex::Regex;
use std::sync::OnceLock;

use crate::validation::{ValidationError, ValidationIssue};

/// Maximum length of a post
pub const POST_MAX_LENGTH: usize = 280;

/// Maximum length of a comment
pub const COMMENT_MAX_LENGTH: usize = 500;

/// Maximum length of a profile bio
pub const BIO_MAX_LENGTH: usize = 160;

const REQUIRED: &str = "Required";

fn too_small(min: usize) -> String {
    format!("Must be at least {} characters", min)
}

fn too_big(max: usize) -> String {
    format!("Must be no more than {} characters", max)
}

/// Collects issues for one form
#[derive(Debug, Default)]
struct FormCheck {
    issues: Vec<ValidationIssue>,
}

impl FormCheck {
    fn check(&mut self, path: &str, result: Result<(), ValidationIssue>) {
        if let Err(mut issue) = result {
            issue.path = path.to_string();
            self.issues.push(issue);
        }
    }

    fn finish(self, message: &str) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(message, self.issues))
        }
    }
}

fn issue(message: impl Into<String>, code: &str) -> ValidationIssue {
    ValidationIssue::new("", message, code)
}

fn required(value: &str) -> Result<(), ValidationIssue> {
    if value.is_empty() {
        return Err(issue(REQUIRED, "too_small"));
    }
    Ok(())
}

fn length_between(value: &str, min: usize, max: usize) -> Result<(), ValidationIssue> {
    let length = value.chars().count();

    if length == 0 {
        return Err(issue(REQUIRED, "too_small"));
    }

    if length < min {
        return Err(issue(too_small(min), "too_small"));
    }

    if length > max {
        return Err(issue(too_big(max), "too_big"));
    }

    Ok(())
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), ValidationIssue> {
    length_between(username, 3, 50)?;

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(issue(
            "Username can only contain letters, numbers, underscores, and hyphens",
            "invalid_string",
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), ValidationIssue> {
    required(email)?;

    if email.len() > 254 {
        return Err(issue(too_big(254), "too_big"));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(issue("Invalid email address", "invalid_string"));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), ValidationIssue> {
    required(password)?;

    if password.chars().count() < 8 {
        return Err(issue(too_small(8), "too_small"));
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if "@$!%*?&".contains(c) {
            has_special = true;
        }
    }

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(issue(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
            "invalid_string",
        ));
    }

    Ok(())
}

/// Validate post content
pub fn validate_post_content(content: &str) -> Result<(), ValidationIssue> {
    length_between(content, 1, POST_MAX_LENGTH)
}

/// Validate comment content
pub fn validate_comment_content(content: &str) -> Result<(), ValidationIssue> {
    length_between(content, 1, COMMENT_MAX_LENGTH)
}

fn passwords_match(password: &str, confirmation: &str) -> Result<(), ValidationIssue> {
    if password != confirmation {
        return Err(issue("Passwords don't match", "custom"));
    }
    Ok(())
}

/// Validate the login form
pub fn validate_login(username: &str, password: &str) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();
    form.check("username", required(username));
    form.check("password", required(password));
    form.finish("Form validation failed")
}

/// Validate the registration form
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();
    form.check("username", validate_username(username));
    form.check("email", validate_email(email));
    form.check("password", validate_password(password));
    form.check("confirmPassword", passwords_match(password, confirm_password));
    form.finish("Form validation failed")
}

/// Validate the create post form
pub fn validate_new_post(content: &str) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();
    form.check("content", validate_post_content(content));
    form.finish("Form validation failed")
}

/// Validate the create comment form
pub fn validate_new_comment(content: &str) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();
    form.check("content", validate_comment_content(content));
    form.finish("Form validation failed")
}

/// Validate a profile update; absent fields are left alone
pub fn validate_profile_update(
    username: Option<&str>,
    email: Option<&str>,
    bio: Option<&str>,
) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();

    if let Some(username) = username {
        form.check("username", validate_username(username));
    }

    if let Some(email) = email {
        form.check("email", validate_email(email));
    }

    if let Some(bio) = bio {
        if bio.chars().count() > BIO_MAX_LENGTH {
            form.check("bio", Err(issue(too_big(BIO_MAX_LENGTH), "too_big")));
        }
    }

    form.finish("Form validation failed")
}

/// Validate the change password form
pub fn validate_password_change(
    current_password: &str,
    new_password: &str,
    confirm_new_password: &str,
) -> Result<(), ValidationError> {
    let mut form = FormCheck::default();
    form.check("currentPassword", required(current_password));
    form.check("newPassword", validate_password(new_password));
    form.check(
        "confirmNewPassword",
        passwords_match(new_password, confirm_new_password),
    );
    form.finish("Form validation failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("jane_doe-1").is_ok());
        assert_eq!(validate_username("").unwrap_err().message, "Required");
        assert_eq!(validate_username("ab").unwrap_err().code, "too_small");
        assert_eq!(validate_username(&"a".repeat(51)).unwrap_err().code, "too_big");
        assert_eq!(validate_username("jane doe").unwrap_err().code, "invalid_string");
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("jane@example.com").is_ok());
        assert_eq!(validate_email("").unwrap_err().message, "Required");
        assert_eq!(
            validate_email("jane@example").unwrap_err().message,
            "Invalid email address"
        );
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("Str0ng!pass").is_ok());
        assert_eq!(validate_password("S0!a").unwrap_err().code, "too_small");
        assert_eq!(
            validate_password("weakpassword").unwrap_err().code,
            "invalid_string"
        );
    }

    #[test]
    fn test_post_length_counts_characters() {
        assert!(validate_post_content(&"é".repeat(POST_MAX_LENGTH)).is_ok());
        assert_eq!(
            validate_post_content(&"x".repeat(POST_MAX_LENGTH + 1))
                .unwrap_err()
                .message,
            "Must be no more than 280 characters"
        );
        assert_eq!(validate_post_content("").unwrap_err().message, "Required");
    }

    #[test]
    fn test_registration_collects_every_field() {
        let error = validate_registration("ab", "nope", "short", "other").unwrap_err();

        let paths: Vec<&str> = error.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["username", "email", "password", "confirmPassword"]);
        assert_eq!(error.message, "Form validation failed");
    }

    #[test]
    fn test_valid_forms_pass() {
        assert!(validate_login("jane", "secret").is_ok());
        assert!(validate_registration("jane", "jane@example.com", "Str0ng!pass", "Str0ng!pass").is_ok());
        assert!(validate_new_post("hello").is_ok());
        assert!(validate_new_comment("nice post").is_ok());
        assert!(validate_profile_update(None, None, None).is_ok());
        assert!(validate_password_change("old", "Str0ng!pass", "Str0ng!pass").is_ok());
    }

    #[test]
    fn test_profile_update_checks_present_fields_only() {
        let error = validate_profile_update(None, Some("bad"), Some(&"b".repeat(161))).unwrap_err();

        assert!(error.has_issues_for("email"));
        assert!(error.has_issues_for("bio"));
        assert!(!error.has_issues_for("username"));
    }

    #[test]
    fn test_login_requires_both_fields() {
        let error = validate_login("", "").unwrap_err();
        assert_eq!(error.issues.len(), 2);
        assert_eq!(error.first_message_for("password"), Some("Required"));
    }
}
