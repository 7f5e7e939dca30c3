//! Error types for fage-core
//!
//! Provides the error hierarchy with thiserror, plus the load report used for
//! graceful degradation of page-level fetches.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for configuration and environment problems
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Config Errors
    // ===================
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Could not determine the user {kind} directory")]
    DirectoryNotFound { kind: &'static str },
}

/// Failures of the durable token storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read session token from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write session token to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove session token at {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the dashboard REST API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 401: the credential is missing, expired or rejected
    #[error("Unauthorized: {detail}")]
    Unauthorized { detail: String },

    #[error("{endpoint} returned HTTP {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid API URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    /// Authorization failures invalidate the session that issued the request.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Errors surfaced by [`SessionStore`](crate::session::SessionStore) operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not logged in")]
    NotAuthenticated,

    /// A logout or newer login replaced the session while this call was in flight
    #[error("Session changed while the request was in flight")]
    Superseded,
}

impl SessionError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Api(e) if e.is_unauthorized())
    }
}

/// Severity level for errors during a page load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical, the slice degrades to an empty view
    Warning,
    /// Significant but not fatal
    Error,
    /// The page cannot continue (session was invalidated)
    Fatal,
}

/// Individual error entry in a load report
#[derive(Debug, Clone)]
pub struct LoadError {
    pub source: String,
    pub message: String,
    pub severity: ErrorSeverity,
    /// Actionable suggestion for user (optional)
    pub suggestion: Option<String>,
}

impl LoadError {
    /// Create user-friendly error from ApiError with context-aware suggestions
    pub fn from_api_error(source: impl Into<String>, error: &ApiError) -> Self {
        let source = source.into();
        let (message, severity, suggestion) = match error {
            ApiError::Unauthorized { detail } => (
                format!("Session rejected: {}", detail),
                ErrorSeverity::Fatal,
                Some("Log in again: fage login".to_string()),
            ),
            ApiError::Transport { endpoint, .. } => (
                format!("Cannot reach {}", endpoint),
                ErrorSeverity::Warning,
                Some("Check the API address: fage --api-url <url> or FAGE_API_URL".to_string()),
            ),
            ApiError::Status {
                status: 404,
                detail,
                ..
            } => (
                detail.clone(),
                ErrorSeverity::Warning,
                Some("Register an account to create a client profile: fage register".to_string()),
            ),
            ApiError::Decode { endpoint, message } => (
                format!("Unexpected response from {}: {}", endpoint, message),
                ErrorSeverity::Error,
                Some("Check that the client and API versions match".to_string()),
            ),
            _ => (error.to_string(), ErrorSeverity::Warning, None),
        };

        Self {
            source,
            message,
            severity,
            suggestion,
        }
    }
}

/// Report of errors encountered while loading a page's independent slices
///
/// Enables graceful degradation by tracking partial failures
/// instead of failing completely on any error.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub errors: Vec<LoadError>,
    pub slices_loaded: usize,
    pub slices_failed: usize,
}

impl LoadReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: LoadError) {
        self.errors.push(error);
    }

    /// Returns true if there are any fatal errors
    pub fn has_fatal_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.severity == ErrorSeverity::Fatal)
    }

    /// Returns true if there are any errors (including warnings)
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
