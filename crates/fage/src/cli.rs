//! Output formatting for fage commands
//!
//! Every formatter renders either a human view (tables via comfy-table) or
//! pretty JSON for scripting.

use chrono::NaiveDateTime;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use fage_core::error::LoadReport;
use fage_core::models::client::mask_secret;
use fage_core::models::{
    AdAccount, BudgetSettings, CampaignList, ClientProfile, ConnectionStatus, OptimizationLog,
    Platform, Profile,
};
use fage_core::{DeployReadiness, Overview};
use serde_json::json;

// ============================================================================
// Session
// ============================================================================

pub fn format_profile(profile: &Profile, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string());
    }

    [
        format!("Email:      {}", profile.email),
        format!("Name:       {}", profile.full_name),
        format!("Role:       {}", profile.role),
        format!("Active:     {}", profile.is_active),
        format!("Member since {}", format_date(&profile.created_at)),
    ]
    .join("\n")
}

// ============================================================================
// Dashboard
// ============================================================================

/// Dashboard view: client, connections, automation, budget and deploy gate
pub fn format_overview(overview: &Overview, report: &LoadReport, json: bool) -> String {
    let readiness = overview.readiness();

    if json {
        let connections: serde_json::Map<String, serde_json::Value> = overview
            .connections
            .iter()
            .map(|(platform, status)| (platform.as_str().to_string(), json!(status.as_str())))
            .collect();
        let blockers: Vec<&str> = readiness.blockers().iter().map(|b| b.message()).collect();
        let warnings: Vec<_> = report
            .errors
            .iter()
            .map(|e| json!({"source": e.source, "message": e.message}))
            .collect();
        let value = json!({
            "client": overview.client,
            "connections": connections,
            "automation": overview.automation,
            "budget": overview.budget,
            "readiness": {
                "can_deploy": readiness.can_deploy(),
                "blockers": blockers,
            },
            "warnings": warnings,
        });
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    let mut lines = vec![];
    match &overview.client {
        Some(client) => {
            lines.push(client.company_name.clone());
            lines.push("=".repeat(client.company_name.chars().count().max(8)));
            lines.push(format!(
                "Monthly budget:   {}",
                format_money(client.monthly_budget, &client.currency)
            ));
            lines.push(format!("Country:          {}", client.country));
        }
        None => {
            lines.push("fage dashboard".to_string());
            lines.push("==============".to_string());
        }
    }

    if let Some(automation) = &overview.automation {
        lines.push(format!("Automation:       {}", automation.automation_status));
    }
    lines.push(String::new());

    lines.push("Ad platforms:".to_string());
    for platform in Platform::ALL {
        let status = overview
            .connections
            .status(platform)
            .unwrap_or(ConnectionStatus::Disconnected);
        lines.push(format!("  {:<12} {}", platform.display_name(), status.as_str()));
    }

    if let Some(budget) = &overview.budget {
        lines.push(String::new());
        let currency = overview.client.as_ref().map(|c| c.currency.as_str());
        lines.push(format_budget_lines(budget, currency));
    }

    lines.push(String::new());
    lines.push(format_readiness(&readiness));

    if report.has_errors() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for error in &report.errors {
            lines.push(format!("  - {}: {}", error.source, error.message));
            if let Some(suggestion) = &error.suggestion {
                lines.push(format!("    {}", suggestion));
            }
        }
    }

    lines.join("\n")
}

pub fn format_readiness(readiness: &DeployReadiness) -> String {
    if readiness.can_deploy() {
        format!(
            "Ready to deploy ({} platform{} connected). Run: fage deploy --yes",
            readiness.connected_platforms(),
            if readiness.connected_platforms() == 1 { "" } else { "s" }
        )
    } else {
        let mut lines = vec!["Not ready to deploy:".to_string()];
        for blocker in readiness.blockers() {
            lines.push(format!("  - {}", blocker));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Ad accounts
// ============================================================================

pub fn format_accounts(accounts: &[AdAccount], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(accounts).unwrap_or_else(|_| "[]".to_string());
    }

    if accounts.is_empty() {
        return "No ad accounts linked. Run: fage connect meta".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(&["Platform", "Account", "Name", "Status"], no_color));

    for account in accounts {
        let platform = account
            .platform()
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| account.platform_id.clone());
        let status = if no_color {
            Cell::new(account.status.as_str())
        } else {
            Cell::new(account.status.as_str()).fg(status_color(account.status))
        };
        table.add_row(vec![
            Cell::new(platform),
            Cell::new(account.account_id.as_deref().unwrap_or("-")),
            Cell::new(account.account_name.as_deref().unwrap_or("-")),
            status,
        ]);
    }

    table.to_string()
}

fn status_color(status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Error => Color::Red,
        ConnectionStatus::Disconnected => Color::DarkGrey,
    }
}

// ============================================================================
// Budget
// ============================================================================

pub fn format_budget(budget: &BudgetSettings, currency: Option<&str>, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(budget).unwrap_or_else(|_| "{}".to_string());
    }
    format_budget_lines(budget, currency)
}

fn format_budget_lines(budget: &BudgetSettings, currency: Option<&str>) -> String {
    let currency = currency.unwrap_or("USD");
    let allocation = &budget.allocation;
    let mut lines = vec![
        "Budget allocation:".to_string(),
        format!("  Prospecting:    {}", format_pct(allocation.prospecting)),
        format!("  Retargeting:    {}", format_pct(allocation.retargeting)),
        format!("  Testing:        {}", format_pct(allocation.testing)),
    ];
    if budget.monthly_cap > 0.0 {
        lines.push(format!(
            "Month to date:    {} of {} ({:.1}%)",
            format_money(budget.current_month_spend, currency),
            format_money(budget.monthly_cap, currency),
            budget.spend_pct().unwrap_or(0.0)
        ));
    }
    lines.join("\n")
}

// ============================================================================
// Client profile
// ============================================================================

pub fn format_client(client: &ClientProfile, json: bool) -> String {
    let masked = |secret: &Option<String>| secret.as_deref().map(mask_secret);

    if json {
        let mut value = serde_json::to_value(client).unwrap_or_else(|_| json!({}));
        for key in [
            "meta_app_secret",
            "google_client_secret",
            "google_developer_token",
        ] {
            if let Some(secret) = value.get(key).and_then(|v| v.as_str()).map(mask_secret) {
                value[key] = json!(secret);
            }
        }
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    let dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    [
        format!("Company:                {}", client.company_name),
        format!("Website:                {}", dash(client.website.clone())),
        format!("Country:                {}", client.country),
        format!("Industry:               {}", dash(client.industry.clone())),
        format!(
            "Monthly budget:         {}",
            format_money(client.monthly_budget, &client.currency)
        ),
        format!("Automation:             {}", client.automation_status),
        format!("Meta app ID:            {}", dash(client.meta_app_id.clone())),
        format!(
            "Meta app secret:        {}",
            dash(masked(&client.meta_app_secret))
        ),
        format!(
            "Google client ID:       {}",
            dash(client.google_client_id.clone())
        ),
        format!(
            "Google client secret:   {}",
            dash(masked(&client.google_client_secret))
        ),
        format!(
            "Google developer token: {}",
            dash(masked(&client.google_developer_token))
        ),
        format!(
            "GA4 property:           {}",
            dash(client.ga4_property_id.clone())
        ),
    ]
    .join("\n")
}

// ============================================================================
// Campaigns and logs
// ============================================================================

pub fn format_campaigns(list: &CampaignList, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(list).unwrap_or_else(|_| "{}".to_string());
    }

    if list.campaigns.is_empty() {
        return "No campaigns found.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(
        &["Name", "Platform", "Type", "Status", "Daily budget", "Created"],
        no_color,
    ));

    for campaign in &list.campaigns {
        let name = truncate(&campaign.name, 40);
        let kind = campaign.campaign_type.as_deref().unwrap_or("-");
        let daily = format!("{:.2}", campaign.daily_budget);
        let created = format_date(&campaign.created_at);
        table.add_row(Row::from(vec![
            name.as_str(),
            campaign.platform.as_str(),
            kind,
            campaign.status.as_str(),
            daily.as_str(),
            created.as_str(),
        ]));
    }

    format!(
        "{}\nShowing {} of {} campaigns",
        table,
        list.campaigns.len(),
        list.total
    )
}

pub fn format_logs(logs: &[OptimizationLog], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(logs).unwrap_or_else(|_| "[]".to_string());
    }

    if logs.is_empty() {
        return "No optimization actions yet.".to_string();
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(&["When", "Action", "Change", "Status", "Reason"], no_color));

    for log in logs {
        let when = log.created_at.format("%Y-%m-%d %H:%M").to_string();
        let change = match (&log.old_value, &log.new_value) {
            (Some(old), Some(new)) => format!("{} -> {}", old, new),
            (None, Some(new)) => new.clone(),
            _ => "-".to_string(),
        };
        let reason = log
            .reason
            .as_deref()
            .map(|r| truncate(r, 50))
            .unwrap_or_default();
        table.add_row(Row::from(vec![
            when.as_str(),
            log.action.as_str(),
            change.as_str(),
            log.status.as_str(),
            reason.as_str(),
        ]));
    }

    table.to_string()
}

// ============================================================================
// Utilities
// ============================================================================

fn header(names: &[&str], no_color: bool) -> Vec<Cell> {
    names
        .iter()
        .map(|name| {
            if no_color {
                Cell::new(name)
            } else {
                Cell::new(name).fg(Color::Cyan)
            }
        })
        .collect()
}

fn format_money(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency)
}

/// Fraction as a whole-or-decimal percentage ("50%", "12.5%")
fn format_pct(fraction: f64) -> String {
    let pct = fraction * 100.0;
    if (pct - pct.round()).abs() < 0.05 {
        format!("{:.0}%", pct)
    } else {
        format!("{:.1}%", pct)
    }
}

fn format_date(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================
