//! Deploy readiness
//!
//! Deploying automation is irreversible, so it is gated on two clauses that
//! must both hold: at least one connected platform, and a budget above zero.
//! Pure and stateless: recompute whenever either input changes.

use crate::models::PlatformConnections;
use std::fmt;

/// Why deploy is not allowed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    NoConnectedPlatform,
    NoBudget,
}

impl Blocker {
    pub fn message(&self) -> &'static str {
        match self {
            Blocker::NoConnectedPlatform => {
                "Please connect at least one ad account before deploying"
            }
            Blocker::NoBudget => "Please set a monthly budget before deploying",
        }
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Proof that readiness passed; required by [`AuthedClient::deploy`](crate::api::AuthedClient::deploy)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployPermit {
    _private: (),
}

/// Result of evaluating the deploy gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReadiness {
    connected_platforms: usize,
    blockers: Vec<Blocker>,
}

impl DeployReadiness {
    pub fn can_deploy(&self) -> bool {
        self.blockers.is_empty()
    }

    /// A permit to deploy, only when no clause failed
    pub fn permit(&self) -> Option<DeployPermit> {
        self.can_deploy().then_some(DeployPermit { _private: () })
    }

    /// Failed clauses, platform first
    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }

    pub fn connected_platforms(&self) -> usize {
        self.connected_platforms
    }

    /// Human-readable reason when deploy is blocked
    pub fn reason(&self) -> Option<String> {
        match self.blockers.as_slice() {
            [] => None,
            [single] => Some(single.message().to_string()),
            _ => Some(
                "Connect at least one ad account and set a monthly budget before deploying"
                    .to_string(),
            ),
        }
    }
}

/// `can_deploy = connected >= 1 && budget > 0`
pub fn evaluate_readiness(connections: &PlatformConnections, budget: f64) -> DeployReadiness {
    let connected_platforms = connections.connected_count();

    let mut blockers = Vec::with_capacity(2);
    if connected_platforms == 0 {
        blockers.push(Blocker::NoConnectedPlatform);
    }
    // NaN fails the comparison and counts as no budget
    if !(budget.is_finite() && budget > 0.0) {
        blockers.push(Blocker::NoBudget);
    }

    DeployReadiness {
        connected_platforms,
        blockers,
    }
}
