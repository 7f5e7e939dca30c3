//! fage-core - Core library for fage
//!
//! Provides the session store, route gate, deploy readiness and budget
//! allocation checks, and the API client for the ad automation dashboard.

pub mod allocation;
pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod models;
pub mod oauth;
pub mod overview;
pub mod readiness;
pub mod session;
pub mod token;

pub use allocation::{validate_allocation, AllocationError, ValidAllocation};
pub use api::{ApiClient, AuthedClient};
pub use config::FageConfig;
pub use error::{ApiError, CoreError, LoadReport, SessionError, StorageError};
pub use event::{EventBus, SessionEvent, SignOutReason};
pub use gate::{decide, GateDecision, RouteGuard, RouteVisibility};
pub use oauth::{ConnectError, ConnectFlow, ConnectOutcome, ConnectResult};
pub use overview::{load_overview, Overview};
pub use readiness::{evaluate_readiness, Blocker, DeployPermit, DeployReadiness};
pub use session::{AuthBackend, BootOutcome, Credential, SessionState, SessionStore};
pub use token::{FileTokenStorage, MemoryTokenStorage, SessionToken, TokenStorage};
