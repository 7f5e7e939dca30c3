//! Route gating from session state
//!
//! [`decide`] is a pure function of the session state and the route class.
//! [`RouteGuard`] re-evaluates it from the watch channel each time the state
//! changes, so a redirect always reflects the latest committed state.

use crate::session::SessionState;
use tokio::sync::watch;

/// Login entry point
pub const LOGIN_ROUTE: &str = "/login";

/// Default landing screen for an authenticated user
pub const DASHBOARD_ROUTE: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteVisibility {
    /// Login and registration screens
    Public,
    /// Everything that needs a session
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Loading,
    Render,
    /// `replace`: the protected route must not stay in history
    RedirectToLogin { replace: bool },
    RedirectToDashboard,
}

impl GateDecision {
    /// Route to navigate to, if any
    pub fn target(&self) -> Option<&'static str> {
        match self {
            GateDecision::RedirectToLogin { .. } => Some(LOGIN_ROUTE),
            GateDecision::RedirectToDashboard => Some(DASHBOARD_ROUTE),
            GateDecision::Loading | GateDecision::Render => None,
        }
    }
}

pub fn decide(state: &SessionState, visibility: RouteVisibility) -> GateDecision {
    match (state, visibility) {
        (SessionState::Authenticating { .. }, _) => GateDecision::Loading,
        (SessionState::Unauthenticated, RouteVisibility::Protected) => {
            GateDecision::RedirectToLogin { replace: true }
        }
        (SessionState::Authenticated { .. }, RouteVisibility::Public) => {
            GateDecision::RedirectToDashboard
        }
        _ => GateDecision::Render,
    }
}

/// Gate for one route, following session changes
pub struct RouteGuard {
    rx: watch::Receiver<SessionState>,
    visibility: RouteVisibility,
}

impl RouteGuard {
    pub fn new(rx: watch::Receiver<SessionState>, visibility: RouteVisibility) -> Self {
        Self { rx, visibility }
    }

    pub fn visibility(&self) -> RouteVisibility {
        self.visibility
    }

    /// Decision for the latest state, marking it seen
    pub fn current(&mut self) -> GateDecision {
        decide(&self.rx.borrow_and_update(), self.visibility)
    }

    /// Wait for the next state change and decide on it
    ///
    /// Returns `None` once the session store is gone.
    pub async fn next_decision(&mut self) -> Option<GateDecision> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }

    /// Wait until the decision is no longer `Loading`
    pub async fn settled(&mut self) -> Option<GateDecision> {
        let decision = self.current();
        if decision != GateDecision::Loading {
            return Some(decision);
        }
        loop {
            let decision = self.next_decision().await?;
            if decision != GateDecision::Loading {
                return Some(decision);
            }
        }
    }
}
