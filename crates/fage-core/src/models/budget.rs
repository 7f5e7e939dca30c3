//! Budget settings and allocation shares

use serde::{Deserialize, Serialize};

/// Split of the monthly budget across campaign families
///
/// Each share is a fraction. The sum invariant is only enforced by
/// [`validate_allocation`](crate::allocation::validate_allocation), so a value
/// being edited may transiently violate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    #[serde(rename = "prospecting_pct")]
    pub prospecting: f64,
    #[serde(rename = "retargeting_pct")]
    pub retargeting: f64,
    #[serde(rename = "testing_pct")]
    pub testing: f64,
}

impl BudgetAllocation {
    pub fn new(prospecting: f64, retargeting: f64, testing: f64) -> Self {
        Self {
            prospecting,
            retargeting,
            testing,
        }
    }

    /// Build from whole percentages (50, 35, 15)
    pub fn from_percentages(prospecting: f64, retargeting: f64, testing: f64) -> Self {
        Self::new(prospecting / 100.0, retargeting / 100.0, testing / 100.0)
    }

    pub fn total(&self) -> f64 {
        self.prospecting + self.retargeting + self.testing
    }
}

impl Default for BudgetAllocation {
    /// Server-side defaults for a new client
    fn default() -> Self {
        Self::new(0.50, 0.35, 0.15)
    }
}

/// `GET /clients/me/budget`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSettings {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub monthly_cap: f64,
    #[serde(default)]
    pub current_month_spend: f64,
    #[serde(flatten)]
    pub allocation: BudgetAllocation,
}

impl BudgetSettings {
    /// Spend as a percentage of the cap, `None` without a cap
    pub fn spend_pct(&self) -> Option<f64> {
        if self.monthly_cap > 0.0 {
            Some(self.current_month_spend / self.monthly_cap * 100.0)
        } else {
            None
        }
    }
}
