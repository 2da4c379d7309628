//! Typed wrappers for the consumed endpoints
//!
//! All of them go through [`ApiClient::send`](crate::ApiClient::send) and so
//! share bearer authentication, token refresh and error normalization.

pub mod auth;
pub mod posts;
pub mod users;
