//! Ad platforms and their connection state

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Advertising platform a client can link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Google,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Meta, Platform::Google];

    /// Identifier used in URLs and query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Meta => "Meta Ads",
            Platform::Google => "Google Ads",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meta" => Ok(Platform::Meta),
            "google" => Ok(Platform::Google),
            other => Err(format!("unknown platform '{}' (expected meta or google)", other)),
        }
    }
}

/// Connection state of one platform link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Error,
    /// Also used for status strings this client does not recognize
    #[serde(other)]
    Disconnected,
}

impl ConnectionStatus {
    /// Precedence when several accounts share a platform
    fn rank(self) -> u8 {
        match self {
            ConnectionStatus::Connected => 2,
            ConnectionStatus::Error => 1,
            ConnectionStatus::Disconnected => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

/// One ad account record from `GET /ad-accounts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAccount {
    #[serde(default)]
    pub id: Option<String>,
    /// Raw platform identifier; see [`AdAccount::platform`]
    #[serde(rename = "platform")]
    pub platform_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl AdAccount {
    /// Parsed platform, `None` for platforms this client does not handle
    pub fn platform(&self) -> Option<Platform> {
        self.platform_id.parse().ok()
    }
}

/// Connection state keyed by platform
///
/// Immutable snapshot handed to the readiness evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformConnections {
    entries: BTreeMap<Platform, ConnectionStatus>,
}

impl PlatformConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold per-account records into one entry per platform
    ///
    /// `connected` beats `error` beats `disconnected`; unknown platforms are skipped.
    pub fn from_accounts(accounts: &[AdAccount]) -> Self {
        let mut connections = Self::new();
        for account in accounts {
            match account.platform() {
                Some(platform) => connections.merge(platform, account.status),
                None => tracing::debug!(
                    platform = %account.platform_id,
                    "Ignoring ad account for unknown platform"
                ),
            }
        }
        connections
    }

    /// Builder-style insert, replacing any previous entry
    pub fn with(mut self, platform: Platform, status: ConnectionStatus) -> Self {
        self.entries.insert(platform, status);
        self
    }

    fn merge(&mut self, platform: Platform, status: ConnectionStatus) {
        self.entries
            .entry(platform)
            .and_modify(|current| {
                if status.rank() > current.rank() {
                    *current = status;
                }
            })
            .or_insert(status);
    }

    pub fn status(&self, platform: Platform) -> Option<ConnectionStatus> {
        self.entries.get(&platform).copied()
    }

    pub fn connected_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| **s == ConnectionStatus::Connected)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, ConnectionStatus)> + '_ {
        self.entries.iter().map(|(p, s)| (*p, *s))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
