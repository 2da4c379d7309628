//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user as stored alongside the tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The active client session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    /// Absent for sessions created by servers that do not issue refresh tokens
    pub refresh_token: Option<String>,
    pub user: UserSummary,
}

impl Session {
    /// Create a new session
    pub fn new(access_token: String, refresh_token: Option<String>, user: UserSummary) -> Self {
        Self {
            access_token,
            refresh_token,
            user,
        }
    }
}
