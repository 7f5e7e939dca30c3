//! Campaign and optimization log listings

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Upper bound the API accepts for `limit`
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub campaign_type: Option<String>,
    pub status: String,
    #[serde(default)]
    pub daily_budget: f64,
    #[serde(default)]
    pub platform_campaign_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// `GET /campaigns`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignList {
    pub campaigns: Vec<Campaign>,
    pub total: u64,
}

/// Filters for `GET /campaigns`
#[derive(Debug, Clone, Default)]
pub struct CampaignQuery {
    pub status: Option<String>,
    pub platform: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CampaignQuery {
    /// Query pairs, with `limit` clamped to the API bounds
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(platform) = &self.platform {
            pairs.push(("platform", platform.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", clamp_limit(limit).to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// One automated action from `GET /automation/logs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationLog {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
}
