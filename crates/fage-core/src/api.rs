//! REST client for the dashboard API
//!
//! [`ApiClient`] covers the unauthenticated endpoints (login, register) and
//! hands out [`AuthedClient`]s bound to one session credential for everything
//! else. Callers pass authenticated results through
//! [`SessionStore::observe`](crate::session::SessionStore::observe) so that an
//! authorization failure ends the session.

use crate::allocation::ValidAllocation;
use crate::config::FageConfig;
use crate::error::ApiError;
use crate::models::{
    AdAccount, AutomationAction, AutomationReport, BudgetSettings, CampaignList, CampaignQuery,
    ClientProfile, ClientUpdate, OptimizationLog, Platform, PlatformConnections, Profile,
};
use crate::readiness::DeployPermit;
use crate::session::{AuthBackend, Credential};
use crate::token::SessionToken;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("fage/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    full_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthUrlResponse {
    auth_url: String,
}

/// HTTP client for the dashboard API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = reqwest::Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                message: "scheme must be http or https".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "client setup".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &FageConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bind this client to a session credential
    pub fn authed(&self, credential: Credential) -> AuthedClient {
        AuthedClient {
            api: self.clone(),
            credential,
        }
    }

    /// Send a request and decode a JSON body, mapping HTTP failures to [`ApiError`]
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let transport = |source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "API response");

        if status.is_success() {
            let body = response.bytes().await.map_err(transport)?;
            return serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

        if status == StatusCode::UNAUTHORIZED {
            warn!(endpoint, %detail, "API rejected credentials");
            Err(ApiError::Unauthorized { detail })
        } else {
            Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                detail,
            })
        }
    }
}

/// Pull the FastAPI `detail` out of an error body
///
/// `detail` is a string for handled errors and a list of `{msg, ...}` objects
/// for request validation errors.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<SessionToken, ApiError> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });
        let response: TokenResponse = self.send("/auth/login", request).await?;
        Ok(SessionToken::new(response.access_token))
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SessionToken, ApiError> {
        let request = self.http.post(self.url("/auth/register")).json(&RegisterRequest {
            email,
            password,
            full_name,
        });
        let response: TokenResponse = self.send("/auth/register", request).await?;
        Ok(SessionToken::new(response.access_token))
    }

    async fn fetch_profile(&self, token: &SessionToken) -> Result<Profile, ApiError> {
        let request = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(token.expose());
        self.send("/auth/me", request).await
    }
}

/// API client bound to one session credential
#[derive(Debug, Clone)]
pub struct AuthedClient {
    api: ApiClient,
    credential: Credential,
}

impl AuthedClient {
    /// The credential this client sends, for [`SessionStore::observe`](crate::session::SessionStore::observe)
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.api
            .http
            .get(self.api.url(path))
            .bearer_auth(self.credential.token().expose())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.api
            .http
            .post(self.api.url(path))
            .bearer_auth(self.credential.token().expose())
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.api
            .http
            .put(self.api.url(path))
            .bearer_auth(self.credential.token().expose())
    }

    pub async fn client(&self) -> Result<ClientProfile, ApiError> {
        self.api.send("/clients/me", self.get("/clients/me")).await
    }

    pub async fn update_client(&self, update: &ClientUpdate) -> Result<ClientProfile, ApiError> {
        let request = self.put("/clients/me").json(update);
        self.api.send("/clients/me", request).await
    }

    pub async fn budget(&self) -> Result<BudgetSettings, ApiError> {
        self.api
            .send("/clients/me/budget", self.get("/clients/me/budget"))
            .await
    }

    /// Persist an allocation that already passed validation
    pub async fn save_allocation(
        &self,
        allocation: ValidAllocation,
    ) -> Result<BudgetSettings, ApiError> {
        let request = self
            .put("/clients/me/budget")
            .json(allocation.allocation());
        self.api.send("/clients/me/budget", request).await
    }

    pub async fn ad_accounts(&self) -> Result<Vec<AdAccount>, ApiError> {
        self.api.send("/ad-accounts", self.get("/ad-accounts")).await
    }

    /// Ad accounts folded into one connection state per platform
    pub async fn connections(&self) -> Result<PlatformConnections, ApiError> {
        let accounts = self.ad_accounts().await?;
        Ok(PlatformConnections::from_accounts(&accounts))
    }

    /// Authorization URL to open in the browser for a platform's OAuth flow
    pub async fn connect_url(&self, platform: Platform) -> Result<String, ApiError> {
        let path = format!("/ad-accounts/{}/connect", platform.as_str());
        let response: OAuthUrlResponse = self.api.send(&path, self.get(&path)).await?;
        Ok(response.auth_url)
    }

    pub async fn automation_status(&self) -> Result<AutomationReport, ApiError> {
        self.api
            .send("/automation/status", self.get("/automation/status"))
            .await
    }

    /// Deploy automation; requires a permit from a passing readiness check
    pub async fn deploy(&self, _permit: DeployPermit) -> Result<AutomationAction, ApiError> {
        self.api
            .send("/automation/deploy", self.post("/automation/deploy"))
            .await
    }

    pub async fn pause(&self) -> Result<AutomationAction, ApiError> {
        self.api
            .send("/automation/pause", self.post("/automation/pause"))
            .await
    }

    pub async fn resume(&self) -> Result<AutomationAction, ApiError> {
        self.api
            .send("/automation/resume", self.post("/automation/resume"))
            .await
    }

    pub async fn campaigns(&self, query: &CampaignQuery) -> Result<CampaignList, ApiError> {
        let request = self.get("/campaigns").query(&query.to_pairs());
        self.api.send("/campaigns", request).await
    }

    pub async fn logs(&self, limit: u32) -> Result<Vec<OptimizationLog>, ApiError> {
        let limit = crate::models::campaign::clamp_limit(limit);
        let request = self.get("/automation/logs").query(&[("limit", limit)]);
        self.api.send("/automation/logs", request).await
    }
}
