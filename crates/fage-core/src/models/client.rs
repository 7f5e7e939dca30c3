//! Client (company) profile

use super::automation::AutomationState;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `GET /clients/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
    #[serde(default)]
    pub website: Option<String>,
    pub country: String,
    #[serde(default)]
    pub industry: Option<String>,
    pub monthly_budget: f64,
    pub currency: String,
    pub automation_status: AutomationState,
    pub is_active: bool,

    // Ad platform credentials supplied by the client
    #[serde(default)]
    pub meta_app_id: Option<String>,
    #[serde(default)]
    pub meta_app_secret: Option<String>,
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,
    #[serde(default)]
    pub google_developer_token: Option<String>,
    #[serde(default)]
    pub ga4_property_id: Option<String>,

    pub created_at: NaiveDateTime,
}

/// `PUT /clients/me` body; only set fields are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_app_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_developer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ga4_property_id: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
