//! Dashboard overview load
//!
//! Fetches the independent read-only slices concurrently. A failed slice
//! degrades to an empty value and is recorded in the [`LoadReport`]; a 401 on
//! any of them goes through [`SessionStore::observe`] and ends the session.

use crate::api::AuthedClient;
use crate::error::{ApiError, LoadError, LoadReport};
use crate::models::{AutomationReport, BudgetSettings, ClientProfile, PlatformConnections};
use crate::readiness::{evaluate_readiness, DeployReadiness};
use crate::session::{AuthBackend, SessionStore};
use tracing::debug;

/// Snapshot of everything the dashboard screen shows
#[derive(Debug, Clone, Default)]
pub struct Overview {
    pub client: Option<ClientProfile>,
    pub connections: PlatformConnections,
    pub automation: Option<AutomationReport>,
    pub budget: Option<BudgetSettings>,
}

impl Overview {
    /// Budget used by the deploy gate: the client's monthly budget, else the
    /// figure in the status report, else zero
    pub fn monthly_budget(&self) -> f64 {
        self.client
            .as_ref()
            .map(|c| c.monthly_budget)
            .or_else(|| self.automation.as_ref().map(|a| a.monthly_budget))
            .unwrap_or(0.0)
    }

    pub fn readiness(&self) -> DeployReadiness {
        evaluate_readiness(&self.connections, self.monthly_budget())
    }
}

fn settle<T>(report: &mut LoadReport, slice: &str, result: Result<T, ApiError>) -> Option<T> {
    match result {
        Ok(value) => {
            report.slices_loaded += 1;
            Some(value)
        }
        Err(e) => {
            debug!(slice, error = %e, "Overview slice failed");
            report.slices_failed += 1;
            report.add_error(LoadError::from_api_error(slice, &e));
            None
        }
    }
}

/// Load all overview slices concurrently
pub async fn load_overview<B: AuthBackend>(
    session: &SessionStore<B>,
    api: &AuthedClient,
) -> (Overview, LoadReport) {
    let credential = api.credential();
    let (client, connections, automation, budget) = tokio::join!(
        api.client(),
        api.connections(),
        api.automation_status(),
        api.budget(),
    );

    let mut report = LoadReport::new();
    let overview = Overview {
        client: settle(&mut report, "client", session.observe(credential, client)),
        connections: settle(
            &mut report,
            "connections",
            session.observe(credential, connections),
        )
        .unwrap_or_default(),
        automation: settle(
            &mut report,
            "automation",
            session.observe(credential, automation),
        ),
        budget: settle(&mut report, "budget", session.observe(credential, budget)),
    };

    debug!(
        loaded = report.slices_loaded,
        failed = report.slices_failed,
        "Overview loaded"
    );
    (overview, report)
}
