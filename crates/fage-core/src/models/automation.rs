//! Automation status and control responses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the client's automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationState {
    Inactive,
    Deploying,
    Active,
    Paused,
    Error,
}

impl AutomationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationState::Inactive => "inactive",
            AutomationState::Deploying => "deploying",
            AutomationState::Active => "active",
            AutomationState::Paused => "paused",
            AutomationState::Error => "error",
        }
    }

    /// The API refuses `pause` while inactive
    pub fn can_pause(&self) -> bool {
        !matches!(self, AutomationState::Inactive)
    }

    /// The API only resumes paused automation
    pub fn can_resume(&self) -> bool {
        matches!(self, AutomationState::Paused)
    }
}

impl fmt::Display for AutomationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connected account counts per platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAccounts {
    #[serde(default)]
    pub meta: u32,
    #[serde(default)]
    pub google: u32,
}

impl ConnectedAccounts {
    pub fn total(&self) -> u32 {
        self.meta + self.google
    }
}

/// `GET /automation/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationReport {
    pub automation_status: AutomationState,
    #[serde(default)]
    pub monthly_budget: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub connected_accounts: ConnectedAccounts,
}

/// Body returned by deploy / pause / resume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationAction {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub connected_accounts: Option<u32>,
}
