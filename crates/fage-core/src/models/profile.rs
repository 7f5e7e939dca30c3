//! Authenticated user profile

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role as reported by `GET /auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Viewer,
    /// Role name this client does not know yet
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Admin => f.write_str("admin"),
            Role::Viewer => f.write_str("viewer"),
            Role::Other(name) => f.write_str(name),
        }
    }
}

/// Immutable snapshot of the logged-in user
///
/// Refreshed only by re-authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    /// Naive UTC timestamp, as the API emits it
    pub created_at: NaiveDateTime,
}
