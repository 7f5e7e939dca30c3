//! Platform connect flow
//!
//! The API hands out an authorization URL; the browser goes through the
//! platform's consent screens and the API finally redirects it to
//! `http://localhost:3001/setup?<platform>=connected|error[&msg=...]`.
//! [`ReturnListener`] serves that one path on an axum router and consumes the
//! first return it sees.

use crate::api::AuthedClient;
use crate::error::ApiError;
use crate::models::Platform;
use crate::session::{AuthBackend, SessionStore};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Path the API redirects the browser to
pub const RETURN_PATH: &str = "/setup";

/// Shown when the API reports an error without a message
pub const GENERIC_CONNECT_ERROR: &str = "Connection failed. Please try again.";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    Error(String),
}

/// One consumed OAuth return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub platform: Platform,
    pub result: ConnectResult,
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        self.result == ConnectResult::Connected
    }
}

impl fmt::Display for ConnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            ConnectResult::Connected => {
                write!(f, "{} connected successfully", self.platform.display_name())
            }
            ConnectResult::Error(message) => {
                write!(f, "{} connection failed: {}", self.platform.display_name(), message)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Failed to request the authorization URL: {0}")]
    Api(#[from] ApiError),

    #[error("Cannot listen on {addr} for the OAuth return: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("No OAuth return within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("OAuth return listener stopped unexpectedly")]
    ListenerClosed,
}

/// Read a return query; `None` when it names no platform
///
/// Any value other than `connected` is an error; a missing or blank `msg`
/// falls back to [`GENERIC_CONNECT_ERROR`].
pub fn parse_return(params: &HashMap<String, String>) -> Option<ConnectOutcome> {
    let (platform, value) = Platform::ALL
        .iter()
        .find_map(|p| params.get(p.as_str()).map(|value| (*p, value)))?;

    let result = if value == "connected" {
        ConnectResult::Connected
    } else {
        let message = params
            .get("msg")
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_CONNECT_ERROR);
        ConnectResult::Error(message.to_string())
    };

    Some(ConnectOutcome { platform, result })
}

struct ReturnState {
    sender: Mutex<Option<oneshot::Sender<ConnectOutcome>>>,
}

async fn handle_return(
    State(state): State<Arc<ReturnState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let Some(outcome) = parse_return(&params) else {
        debug!("OAuth return without a platform key");
        return (
            StatusCode::BAD_REQUEST,
            page("No connection result in this request."),
        );
    };

    let Some(sender) = state.sender.lock().take() else {
        return (
            StatusCode::OK,
            page("This connection was already handled. You can close this tab."),
        );
    };

    let body = page(&format!("{}. You can close this tab.", outcome));
    if sender.send(outcome).is_err() {
        warn!("OAuth return arrived after the listener gave up");
    }
    (StatusCode::OK, body)
}

fn page(message: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><title>fage</title></head><body><p>{}</p></body></html>",
        escape_html(message)
    ))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One-shot listener for the OAuth return
///
/// Bind it before opening the browser so the redirect cannot arrive first.
pub struct ReturnListener {
    local_addr: SocketAddr,
    outcome: Option<oneshot::Receiver<ConnectOutcome>>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl ReturnListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self, ConnectError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ConnectError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ConnectError::Bind { addr, source })?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = Arc::new(ReturnState {
            sender: Mutex::new(Some(outcome_tx)),
        });
        let app = Router::new()
            .route(RETURN_PATH, get(handle_return))
            .with_state(state);

        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "OAuth return listener failed");
            }
        });

        debug!(addr = %local_addr, "OAuth return listener ready");
        Ok(Self {
            local_addr,
            outcome: Some(outcome_rx),
            shutdown: Some(shutdown_tx),
            server: Some(server),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the first return, then stop serving
    ///
    /// The listener is spent afterwards; later calls return `ListenerClosed`.
    pub async fn wait(&mut self, timeout: Duration) -> Result<ConnectOutcome, ConnectError> {
        let Some(mut outcome) = self.outcome.take() else {
            return Err(ConnectError::ListenerClosed);
        };
        let received = tokio::time::timeout(timeout, &mut outcome).await;

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut server) = self.server.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut server)
                .await
                .is_err()
            {
                debug!("OAuth return listener slow to stop, aborting");
                server.abort();
            }
        }

        match received {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(ConnectError::ListenerClosed),
            Err(_) => Err(ConnectError::Timeout(timeout)),
        }
    }
}

impl Drop for ReturnListener {
    fn drop(&mut self) {
        if let Some(server) = &self.server {
            server.abort();
        }
    }
}

/// Connect a platform: listen, send the user to the authorization URL, wait
#[derive(Debug, Clone)]
pub struct ConnectFlow {
    return_address: SocketAddr,
    timeout: Duration,
}

impl ConnectFlow {
    pub fn new(return_address: SocketAddr, timeout: Duration) -> Self {
        Self {
            return_address,
            timeout,
        }
    }

    /// `launch` receives the authorization URL (open a browser, print it)
    pub async fn run<B, F>(
        &self,
        session: &SessionStore<B>,
        client: &AuthedClient,
        platform: Platform,
        launch: F,
    ) -> Result<ConnectOutcome, ConnectError>
    where
        B: AuthBackend,
        F: FnOnce(&str),
    {
        let mut listener = ReturnListener::bind(self.return_address).await?;
        let auth_url = session.observe(client.credential(), client.connect_url(platform).await)?;

        info!(%platform, "Waiting for OAuth return");
        launch(&auth_url);

        let outcome = listener.wait(self.timeout).await?;
        info!(platform = %outcome.platform, connected = outcome.is_connected(), "OAuth return received");
        Ok(outcome)
    }
}
