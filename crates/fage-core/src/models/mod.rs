//! Data models for the dashboard API

pub mod automation;
pub mod budget;
pub mod campaign;
pub mod client;
pub mod platform;
pub mod profile;

pub use automation::{AutomationAction, AutomationReport, AutomationState, ConnectedAccounts};
pub use budget::{BudgetAllocation, BudgetSettings};
pub use campaign::{Campaign, CampaignList, CampaignQuery, OptimizationLog};
pub use client::{ClientProfile, ClientUpdate};
pub use platform::{AdAccount, ConnectionStatus, Platform, PlatformConnections};
pub use profile::{Profile, Role};
