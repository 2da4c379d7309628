//! Canonical validation errors
//!
//! The backend reports validation failures in two shapes: the structured
//! `VALIDATION_ERROR` envelope with an `issues` list, and an older map of
//! field names to message lists. Both are converted here into a single
//! [`ValidationError`] so that form code only ever deals with one shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Error code carried by the canonical validation envelope
pub const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

/// Issue code assigned to messages that arrive without one
pub const GENERIC_ISSUE_CODE: &str = "validation_error";

/// Path used for issues that do not belong to a specific field
pub const ROOT_PATH: &str = "root";

/// A single problem with a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted field reference, or `root`
    pub path: String,
    /// Human readable message
    pub message: String,
    /// Machine readable code (`too_small`, `invalid_string`, ...)
    pub code: String,
}

impl ValidationIssue {
    /// Create a new issue. An empty path is stored as `root`.
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self {
            path: if path.is_empty() {
                ROOT_PATH.to_string()
            } else {
                path
            },
            message: message.into(),
            code: code.into(),
        }
    }
}

/// The canonical validation error consumed by forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Top level summary message
    pub message: String,
    /// Individual field issues
    pub issues: Vec<ValidationIssue>,
}

#[derive(Deserialize)]
struct CanonicalBody {
    #[serde(default)]
    success: Option<bool>,
    error: CanonicalPayload,
}

#[derive(Deserialize)]
struct CanonicalPayload {
    code: String,
    message: String,
    details: CanonicalDetails,
}

#[derive(Deserialize)]
struct CanonicalDetails {
    issues: Vec<ValidationIssue>,
}

#[derive(Deserialize)]
struct LegacyBody {
    error: LegacyPayload,
}

#[derive(Deserialize)]
struct LegacyPayload {
    message: String,
    errors: Map<String, Value>,
}

impl ValidationError {
    /// Create a validation error from a message and its issues
    pub fn new(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            message: message.into(),
            issues,
        }
    }

    /// Create a validation error holding one issue for one field
    pub fn field(
        path: impl Into<String>,
        message: impl Into<String>,
        code: Option<&str>,
    ) -> Self {
        Self::new(
            "Field validation failed",
            vec![ValidationIssue::new(
                path,
                message,
                code.unwrap_or(GENERIC_ISSUE_CODE),
            )],
        )
    }

    /// Merge several validation errors into one, keeping every issue in order
    pub fn merge<I>(errors: I) -> Self
    where
        I: IntoIterator<Item = ValidationError>,
    {
        let issues = errors.into_iter().flat_map(|error| error.issues).collect();
        Self::new("Multiple validation errors", issues)
    }

    /// Parse a response body in either the canonical or the legacy shape.
    ///
    /// Returns `None` for anything that is not exactly one of the two shapes.
    pub fn from_body(body: &Value) -> Option<Self> {
        Self::from_canonical(body).or_else(|| Self::from_legacy(body))
    }

    /// Parse the canonical `{ success: false, error: { code: "VALIDATION_ERROR", ... } }` body
    pub fn from_canonical(body: &Value) -> Option<Self> {
        let body = CanonicalBody::deserialize(body).ok()?;
        if body.success == Some(true) || body.error.code != VALIDATION_ERROR_CODE {
            return None;
        }

        Some(Self::new(body.error.message, body.error.details.issues))
    }

    /// Parse the legacy `{ error: { message, errors: { field: [messages] } } }` body
    pub fn from_legacy(body: &Value) -> Option<Self> {
        let body = LegacyBody::deserialize(body).ok()?;

        let fields = body
            .error
            .errors
            .iter()
            .map(|(field, messages)| {
                Vec::<String>::deserialize(messages)
                    .ok()
                    .map(|messages| (field.clone(), messages))
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self::new(
            body.error.message,
            legacy_field_map_to_issues(fields),
        ))
    }

    /// Render this error in the canonical wire shape
    pub fn to_body(&self) -> Value {
        json!({
            "success": false,
            "error": {
                "code": VALIDATION_ERROR_CODE,
                "message": self.message,
                "details": {
                    "issues": self.issues,
                },
            },
        })
    }

    /// Issues whose path is exactly `path`
    pub fn issues_for(&self, path: &str) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|issue| issue.path == path).collect()
    }

    /// First message reported for `path`
    pub fn first_message_for(&self, path: &str) -> Option<&str> {
        self.issues
            .iter()
            .find(|issue| issue.path == path)
            .map(|issue| issue.message.as_str())
    }

    /// Whether any issue targets `path`
    pub fn has_issues_for(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }

    /// Group issues by field path.
    ///
    /// Groups appear in the order their path was first seen; issues keep
    /// their relative order inside a group.
    pub fn group_by_field(&self) -> Vec<(String, Vec<ValidationIssue>)> {
        let mut groups: Vec<(String, Vec<ValidationIssue>)> = Vec::new();

        for issue in &self.issues {
            match groups.iter_mut().find(|(path, _)| *path == issue.path) {
                Some((_, issues)) => issues.push(issue.clone()),
                None => groups.push((issue.path.clone(), vec![issue.clone()])),
            }
        }

        groups
    }

    /// Drop every issue for `path`. Returns `None` once no issue is left.
    pub fn without_field(&self, path: &str) -> Option<Self> {
        let issues: Vec<ValidationIssue> = self
            .issues
            .iter()
            .filter(|issue| issue.path != path)
            .cloned()
            .collect();

        if issues.is_empty() {
            None
        } else {
            Some(Self::new(self.message.clone(), issues))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Flatten a field to messages map into one issue per message.
///
/// Every issue gets [`GENERIC_ISSUE_CODE`]; an empty field name maps to `root`.
pub fn legacy_field_map_to_issues<I, K, V, M>(fields: I) -> Vec<ValidationIssue>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: IntoIterator<Item = M>,
    M: Into<String>,
{
    fields
        .into_iter()
        .flat_map(|(field, messages)| {
            let field = field.into();
            messages
                .into_iter()
                .map(move |message| ValidationIssue::new(field.clone(), message, GENERIC_ISSUE_CODE))
        })
        .collect()
}

/// Format issues for display: a single message as is, several as a numbered list
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => String::new(),
        [issue] => issue.message.clone(),
        issues => issues
            .iter()
            .enumerate()
            .map(|(index, issue)| format!("{}. {}", index + 1, issue.message))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Extract the message a server embedded in an error body.
///
/// Looks at `error.message`, then a plain string `error`, then a top level
/// `message`.
pub fn server_message(body: &Value) -> Option<String> {
    let error = body.get("error");

    error
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn canonical_body() -> Value {
        json!({
            "success": false,
            "error": {
                "code": "VALIDATION_ERROR",
                "message": "Request validation failed",
                "details": {
                    "issues": [
                        { "path": "username", "message": "Must be at least 3 characters", "code": "too_small" },
                        { "path": "email", "message": "Invalid email address", "code": "invalid_string" },
                        { "path": "username", "message": "Username is taken", "code": "custom" }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_canonical_body_is_parsed() {
        let error = ValidationError::from_body(&canonical_body()).expect("canonical body");

        assert_eq!(error.message, "Request validation failed");
        assert_eq!(error.issues.len(), 3);
        assert_eq!(
            error.issues[1],
            ValidationIssue::new("email", "Invalid email address", "invalid_string")
        );
    }

    #[test]
    fn test_canonical_body_survives_rendering() {
        let error = ValidationError::from_body(&canonical_body()).unwrap();
        assert_eq!(error.to_body(), canonical_body());
    }

    #[test]
    fn test_legacy_body_is_upgraded() {
        let body = json!({
            "error": {
                "message": "Invalid input",
                "errors": { "username": ["too short"] }
            }
        });

        let error = ValidationError::from_body(&body).expect("legacy body");
        assert_eq!(error.message, "Invalid input");
        assert_eq!(
            error.issues,
            vec![ValidationIssue::new("username", "too short", GENERIC_ISSUE_CODE)]
        );
    }

    #[test]
    fn test_legacy_body_keeps_field_order() {
        let body = json!({
            "error": {
                "message": "Invalid input",
                "errors": {
                    "password": ["too short", "needs a digit"],
                    "email": ["invalid"]
                }
            }
        });

        let error = ValidationError::from_body(&body).unwrap();
        let paths: Vec<&str> = error.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["password", "password", "email"]);
    }

    #[test]
    fn test_malformed_bodies_are_rejected() {
        let bodies = [
            json!(null),
            json!("Internal server error"),
            json!({ "error": "Unauthorized" }),
            json!({ "error": { "code": "NOT_FOUND", "message": "Post not found" } }),
            json!({
                "success": false,
                "error": { "code": "SOMETHING_ELSE", "message": "x", "details": { "issues": [] } }
            }),
            json!({
                "success": false,
                "error": { "code": "VALIDATION_ERROR", "message": "x", "details": { "issues": [{ "path": "a" }] } }
            }),
            json!({
                "success": true,
                "error": { "code": "VALIDATION_ERROR", "message": "x", "details": { "issues": [] } }
            }),
            json!({ "error": { "message": "x", "errors": { "username": "not a list" } } }),
            json!({ "error": { "message": "x", "errors": { "username": [1, 2] } } }),
        ];

        for body in &bodies {
            assert_eq!(ValidationError::from_body(body), None, "accepted {body}");
        }
    }

    #[test]
    fn test_legacy_field_map_to_issues() {
        let mut fields = BTreeMap::new();
        fields.insert("email", vec!["Invalid email"]);
        fields.insert("", vec!["Something is off"]);

        let issues = legacy_field_map_to_issues(fields);
        assert_eq!(
            issues,
            vec![
                ValidationIssue::new("root", "Something is off", GENERIC_ISSUE_CODE),
                ValidationIssue::new("email", "Invalid email", GENERIC_ISSUE_CODE),
            ]
        );
    }

    #[test]
    fn test_field_helpers() {
        let error = ValidationError::from_body(&canonical_body()).unwrap();

        assert_eq!(error.issues_for("username").len(), 2);
        assert!(error.issues_for("password").is_empty());
        assert_eq!(
            error.first_message_for("username"),
            Some("Must be at least 3 characters")
        );
        assert!(error.has_issues_for("email"));
        assert!(!error.has_issues_for("user"));
    }

    #[test]
    fn test_group_by_field_keeps_first_seen_order() {
        let error = ValidationError::from_body(&canonical_body()).unwrap();
        let groups = error.group_by_field();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "username");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].message, "Username is taken");
        assert_eq!(groups[1].0, "email");
    }

    #[test]
    fn test_without_field() {
        let error = ValidationError::from_body(&canonical_body()).unwrap();

        let remaining = error.without_field("username").unwrap();
        assert_eq!(remaining.issues.len(), 1);
        assert_eq!(remaining.message, error.message);

        assert_eq!(remaining.without_field("email"), None);
    }

    #[test]
    fn test_merge_and_format() {
        let merged = ValidationError::merge([
            ValidationError::field("username", "Required", None),
            ValidationError::field("password", "Too short", Some("too_small")),
        ]);

        assert_eq!(merged.message, "Multiple validation errors");
        assert_eq!(merged.issues[0].code, GENERIC_ISSUE_CODE);
        assert_eq!(merged.issues[1].code, "too_small");
        assert_eq!(format_issues(&merged.issues), "1. Required\n2. Too short");
        assert_eq!(format_issues(&merged.issues[..1]), "Required");
        assert_eq!(format_issues(&[]), "");
    }

    #[test]
    fn test_server_message() {
        assert_eq!(
            server_message(&json!({ "error": { "code": "not_found", "message": "Post not found" } })),
            Some("Post not found".to_string())
        );
        assert_eq!(
            server_message(&json!({ "error": "Unauthorized" })),
            Some("Unauthorized".to_string())
        );
        assert_eq!(
            server_message(&json!({ "message": "Bad gateway" })),
            Some("Bad gateway".to_string())
        );
        assert_eq!(server_message(&json!({ "error": { "message": "" } })), None);
        assert_eq!(server_message(&json!([1, 2, 3])), None);
    }
}
