//! Common library for the Chirp client
//!
//! This crate provides the pieces shared by the API client and its front
//! ends: the canonical validation error, form validation, the session model,
//! and persisted session storage.
//!
//! ```rust
//! use common::validation::ValidationError;
//! use serde_json::json;
//!
//! let body = json!({
//!     "error": { "message": "Invalid input", "errors": { "username": ["too short"] } }
//! });
//!
//! let error = ValidationError::from_body(&body).unwrap();
//! assert_eq!(error.first_message_for("username"), Some("too short"));
//! ```

pub mod error;
pub mod forms;
pub mod session;
pub mod storage;
pub mod validation;

pub use session::{Session, UserSummary};
pub use validation::{ValidationError, ValidationIssue};
