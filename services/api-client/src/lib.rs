//! API client for the Chirp social posting service
//!
//! This crate wraps the REST API behind an authenticated request pipeline:
//! bearer tokens are attached from the persisted session, expired access
//! tokens are refreshed once for all concurrent callers, and error bodies are
//! normalized into one canonical validation error.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod redirect;
pub mod refresh;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use error::{
    ClientError, ClientResult, describe, error_message, is_validation_error, to_validation_error,
};
pub use redirect::{LogRedirect, LoginRedirect};
pub use transport::{ApiRequest, HttpResponse, ReqwestTransport, RequestAuth, Transport};
