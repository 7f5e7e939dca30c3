//! Integration tests for the session flow against an in-process mock API

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use fage_core::models::BudgetAllocation;
use fage_core::{
    load_overview, validate_allocation, ApiClient, BootOutcome, FileTokenStorage, GateDecision,
    RouteGuard, RouteVisibility, SessionEvent, SessionState, SessionStore, SessionToken,
    SignOutReason, TokenStorage,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const GOOD_TOKEN: &str = "good-token";

#[derive(Default)]
struct MockApi {
    hits: Mutex<HashMap<&'static str, usize>>,
    expired: AtomicBool,
    budget_down: AtomicBool,
    paused: AtomicBool,
}

impl MockApi {
    fn hit(&self, route: &'static str) {
        *self.hits.lock().entry(route).or_default() += 1;
    }

    fn hits(&self, route: &str) -> usize {
        self.hits.lock().get(route).copied().unwrap_or(0)
    }

    fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        bearer == Some("Bearer good-token") && !self.expired.load(Ordering::SeqCst)
    }
}

type Reply = (StatusCode, Json<Value>);

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
}

async fn login(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Reply {
    api.hit("login");
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({"access_token": GOOD_TOKEN, "token_type": "bearer"})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid email or password"})),
        )
    }
}

async fn register(State(api): State<Arc<MockApi>>, Json(body): Json<Value>) -> Reply {
    api.hit("register");
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Email already registered"})),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"access_token": GOOD_TOKEN, "token_type": "bearer"})),
    )
}

async fn me(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("me");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "u1",
            "email": "ana@example.com",
            "full_name": "Ana Lima",
            "role": "owner",
            "is_active": true,
            "created_at": "2025-03-14T09:26:53.589793"
        })),
    )
}

async fn client(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("client");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "c1",
            "user_id": "u1",
            "company_name": "Lima Outdoor",
            "website": "https://lima.example.com",
            "country": "BR",
            "industry": "retail",
            "monthly_budget": 1000.0,
            "currency": "USD",
            "automation_status": "inactive",
            "is_active": true,
            "meta_app_secret": "abcd1234efgh5678",
            "created_at": "2025-03-14T09:30:00"
        })),
    )
}

async fn ad_accounts(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("ad_accounts");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([
            {"platform": "meta", "status": "connected", "account_name": "Lima BR"},
            {"platform": "google", "status": "disconnected"}
        ])),
    )
}

async fn automation_status(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("automation_status");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "automation_status": "inactive",
            "monthly_budget": 1000.0,
            "country": "BR",
            "connected_accounts": {"meta": 1, "google": 0}
        })),
    )
}

async fn budget(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("budget");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    if api.budget_down.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Database unavailable"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "b1", "client_id": "c1",
            "monthly_cap": 1000.0, "current_month_spend": 250.0,
            "prospecting_pct": 0.5, "retargeting_pct": 0.35, "testing_pct": 0.15
        })),
    )
}

async fn save_budget(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    api.hit("save_budget");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "b1", "client_id": "c1",
            "monthly_cap": 1000.0, "current_month_spend": 250.0,
            "prospecting_pct": body["prospecting_pct"],
            "retargeting_pct": body["retargeting_pct"],
            "testing_pct": body["testing_pct"]
        })),
    )
}

async fn deploy(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("deploy");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "deploying",
            "message": "Automation deployment started",
            "client_id": "c1",
            "connected_accounts": 1
        })),
    )
}

async fn pause(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("pause");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    if api.paused.swap(true, Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Automation is not active"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "paused",
            "message": "Automation paused. No actions will be taken until resumed."
        })),
    )
}

async fn resume(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Reply {
    api.hit("resume");
    if !api.authorized(&headers) {
        return unauthorized();
    }
    if !api.paused.swap(false, Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Automation is not paused"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "active",
            "message": "Automation resumed. Optimization will continue."
        })),
    )
}

/// Serve the mock on an ephemeral port and return its `/api` base URL
async fn spawn_mock() -> (String, Arc<MockApi>) {
    let api = Arc::new(MockApi::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/clients/me", get(client))
        .route("/api/clients/me/budget", get(budget).put(save_budget))
        .route("/api/ad-accounts", get(ad_accounts))
        .route("/api/automation/status", get(automation_status))
        .route("/api/automation/deploy", post(deploy))
        .route("/api/automation/pause", post(pause))
        .route("/api/automation/resume", post(resume))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), api)
}

fn session_for(
    base_url: &str,
    dir: &TempDir,
) -> (SessionStore<ApiClient>, Arc<FileTokenStorage>) {
    let client = ApiClient::new(base_url, Duration::from_secs(5)).unwrap();
    let storage = Arc::new(FileTokenStorage::new(dir.path().join("fage_token")));
    (SessionStore::new(client, storage.clone()), storage)
}

#[tokio::test]
async fn test_boot_without_token_makes_no_requests() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);

    assert_eq!(session.boot().await, BootOutcome::Anonymous);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(api.total_hits(), 0);
}

#[tokio::test]
async fn test_login_then_protected_route_renders() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    session.boot().await;

    let mut dashboard = RouteGuard::new(session.subscribe(), RouteVisibility::Protected);
    let mut login_page = RouteGuard::new(session.subscribe(), RouteVisibility::Public);
    assert_eq!(
        dashboard.current(),
        GateDecision::RedirectToLogin { replace: true }
    );
    assert_eq!(login_page.current(), GateDecision::Render);

    let user = session.login("ana@example.com", "secret").await.unwrap();
    assert_eq!(user.full_name, "Ana Lima");
    assert_eq!(storage.load().unwrap(), Some(SessionToken::new(GOOD_TOKEN)));

    // No re-navigation: the guards pick up the committed state
    assert_eq!(dashboard.next_decision().await, Some(GateDecision::Render));
    assert_eq!(
        login_page.next_decision().await,
        Some(GateDecision::RedirectToDashboard)
    );
    assert_eq!(api.hits("login"), 1);
    assert_eq!(api.hits("me"), 1);
}

#[tokio::test]
async fn test_wrong_password_surfaces_detail() {
    let (base_url, _api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    session.boot().await;

    let err = session.login("ana@example.com", "nope").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("Invalid email or password"));
    assert_eq!(storage.load().unwrap(), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_boot_with_rejected_token_clears_it() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    storage.store(&SessionToken::new("old-token")).unwrap();

    assert_eq!(session.boot().await, BootOutcome::Rejected);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(storage.load().unwrap(), None);
    assert!(!dir.path().join("fage_token").exists());
    assert_eq!(api.hits("me"), 1);
}

#[tokio::test]
async fn test_boot_restores_stored_session() {
    let (base_url, _api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    storage.store(&SessionToken::new(GOOD_TOKEN)).unwrap();

    assert!(matches!(session.boot().await, BootOutcome::Restored(_)));
    assert!(session.state().is_authenticated());
}

#[tokio::test]
async fn test_unauthorized_call_ends_session() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    let mut events = session.events().subscribe();

    api.expired.store(true, Ordering::SeqCst);
    let authed = session.backend().authed(session.credential().unwrap());
    let result = session.observe(authed.credential(), authed.client().await);

    assert!(result.unwrap_err().is_unauthorized());
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(storage.load().unwrap(), None);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut(SignOutReason::Expired)
    );
}

#[tokio::test]
async fn test_overview_degrades_failed_slice() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    api.budget_down.store(true, Ordering::SeqCst);

    let authed = session.backend().authed(session.credential().unwrap());
    let (overview, report) = load_overview(&session, &authed).await;

    assert!(overview.budget.is_none());
    assert_eq!(
        overview.client.as_ref().map(|c| c.company_name.as_str()),
        Some("Lima Outdoor")
    );
    assert_eq!(overview.connections.connected_count(), 1);
    assert!(overview.automation.is_some());
    assert_eq!(report.slices_loaded, 3);
    assert_eq!(report.slices_failed, 1);
    assert_eq!(report.errors[0].source, "budget");
    assert!(report.errors[0].message.contains("Database unavailable"));

    assert!(overview.readiness().can_deploy());
    assert!(session.state().is_authenticated());
}

#[tokio::test]
async fn test_invalid_allocation_never_reaches_api() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    let authed = session.backend().authed(session.credential().unwrap());

    let err = validate_allocation(&BudgetAllocation::from_percentages(50.0, 30.0, 14.0))
        .unwrap_err();
    assert!(err.to_string().contains("94%"));
    assert_eq!(api.hits("save_budget"), 0);

    let valid =
        validate_allocation(&BudgetAllocation::from_percentages(60.0, 30.0, 10.0)).unwrap();
    let saved = authed.save_allocation(valid).await.unwrap();
    assert_eq!(saved.allocation, BudgetAllocation::new(0.6, 0.3, 0.1));
    assert_eq!(api.hits("save_budget"), 1);
}

#[tokio::test]
async fn test_deploy_requires_passing_readiness() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    let authed = session.backend().authed(session.credential().unwrap());

    let (overview, _) = load_overview(&session, &authed).await;
    let permit = overview.readiness().permit().unwrap();
    let action = authed.deploy(permit).await.unwrap();

    assert_eq!(action.status, "deploying");
    assert_eq!(api.hits("deploy"), 1);
}

#[tokio::test]
async fn test_register_signs_in_with_issued_token() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    session.boot().await;

    let user = session
        .register("ana@example.com", "secret", "Ana Lima")
        .await
        .unwrap();

    assert_eq!(user.email, "ana@example.com");
    assert!(session.state().is_authenticated());
    assert_eq!(storage.load().unwrap(), Some(SessionToken::new(GOOD_TOKEN)));
    assert_eq!(api.hits("register"), 1);
    assert_eq!(api.hits("me"), 1);
}

#[tokio::test]
async fn test_register_with_taken_email_surfaces_detail() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, storage) = session_for(&base_url, &dir);
    session.boot().await;

    let err = session
        .register("taken@example.com", "secret", "Someone")
        .await
        .unwrap_err();

    assert!(!err.is_unauthorized());
    assert!(err.to_string().contains("Email already registered"));
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(storage.load().unwrap(), None);
    assert_eq!(api.hits("me"), 0);
}

#[tokio::test]
async fn test_pause_refused_when_not_active() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    let authed = session.backend().authed(session.credential().unwrap());

    let action = authed.pause().await.unwrap();
    assert_eq!(action.status, "paused");

    let err = session
        .observe(authed.credential(), authed.pause().await)
        .unwrap_err();
    assert!(err.to_string().contains("Automation is not active"));
    assert!(session.state().is_authenticated());
    assert_eq!(api.hits("pause"), 2);
}

#[tokio::test]
async fn test_resume_refused_unless_paused() {
    let (base_url, api) = spawn_mock().await;
    let dir = TempDir::new().unwrap();
    let (session, _) = session_for(&base_url, &dir);
    session.boot().await;
    session.login("ana@example.com", "secret").await.unwrap();
    let authed = session.backend().authed(session.credential().unwrap());

    let err = session
        .observe(authed.credential(), authed.resume().await)
        .unwrap_err();
    assert!(err.to_string().contains("Automation is not paused"));
    assert!(session.state().is_authenticated());

    authed.pause().await.unwrap();
    let action = authed.resume().await.unwrap();
    assert_eq!(action.status, "active");
    assert_eq!(api.hits("resume"), 2);
}
