//! fage - command line client for the fage ad automation dashboard

mod cli;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fage_core::models::{AutomationAction, BudgetAllocation, CampaignQuery, ClientUpdate, Platform};
use fage_core::{
    load_overview, validate_allocation, ApiClient, AuthedClient, ConnectFlow, ConnectResult,
    FageConfig, FileTokenStorage, GateDecision, RouteGuard, RouteVisibility, SessionEvent,
    SessionStore, SignOutReason,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

type Session = SessionStore<ApiClient>;

#[derive(Parser)]
#[command(
    name = "fage",
    version,
    about = "Command line client for the fage ad automation dashboard",
    long_about = "Log in, link Meta and Google ad accounts, set the budget split and\n\
                  deploy or pause automated campaign management.\n\
                  \n\
                  Examples:\n\
                    fage login --email ana@example.com   # Log in (password read from stdin)\n\
                    fage status                          # Dashboard and deploy readiness\n\
                    fage connect meta                    # Link an ad account in the browser\n\
                    fage budget set 50 35 15             # Prospecting / retargeting / testing\n\
                    fage deploy --yes                    # Start automation\n\
                    fage campaigns --platform google     # List campaigns\n\
                  \n\
                  Environment Variables:\n\
                    FAGE_API_URL                         # API base URL\n\
                    FAGE_CONFIG                          # Config file path\n\
                    FAGE_TOKEN_PATH                      # Session token file\n\
                    FAGE_PASSWORD                        # Password for login/register\n\
                    FAGE_LOG                             # Log filter (e.g. fage_core=debug)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Dashboard API base URL (default: http://localhost:8000/api)
    #[arg(long, global = true, env = "FAGE_API_URL")]
    api_url: Option<String>,

    /// Config file (default: <config dir>/fage/config.toml)
    #[arg(long, global = true, env = "FAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Session token file (default: <local data dir>/fage/fage_token)
    #[arg(long, global = true, env = "FAGE_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors in tables
    #[arg(long, global = true, env = "FAGE_NO_COLOR")]
    no_color: bool,

    /// Log progress to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Debug logging (HTTP internals stay at warn)
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password
    Login {
        #[arg(long, short = 'e')]
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "FAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(long, short = 'e')]
        email: String,
        /// Full name
        #[arg(long, short = 'n')]
        name: String,
        /// Read from stdin when omitted
        #[arg(long, env = "FAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Dashboard: client, ad platforms, automation, budget and deploy readiness
    #[command(alias = "dashboard")]
    Status,
    /// List linked ad accounts
    Accounts,
    /// Link an ad platform through its consent screen
    Connect {
        /// meta or google
        platform: Platform,
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show or change the budget allocation
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,
    },
    /// Show or update the client profile
    Client {
        #[command(subcommand)]
        action: Option<ClientAction>,
    },
    /// Deploy automation (cannot be undone)
    Deploy {
        /// Confirm the deployment
        #[arg(long)]
        yes: bool,
    },
    /// Pause active automation
    Pause,
    /// Resume paused automation
    Resume,
    /// List campaigns
    Campaigns {
        /// Filter by status (e.g. active, paused)
        #[arg(long)]
        status: Option<String>,
        /// Filter by platform
        #[arg(long)]
        platform: Option<Platform>,
        /// Page size (1-200)
        #[arg(long, short = 'n', default_value = "50")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Show recent optimization actions
    Logs {
        /// Number of entries (1-200)
        #[arg(long, short = 'n', default_value = "50")]
        limit: u32,
    },
}

impl Command {
    /// Gate class for the command; `None` runs without a session check
    fn visibility(&self) -> Option<RouteVisibility> {
        match self {
            Command::Login { .. } | Command::Register { .. } => Some(RouteVisibility::Public),
            Command::Logout => None,
            _ => Some(RouteVisibility::Protected),
        }
    }
}

#[derive(Subcommand)]
enum BudgetAction {
    /// Show the current allocation and spend
    Show,
    /// Set the split in whole percentages; the three must total 100
    Set {
        prospecting: f64,
        retargeting: f64,
        testing: f64,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Show the client profile (secrets masked)
    Show,
    /// Update profile fields; only the given fields change
    Set(ClientUpdateArgs),
}

#[derive(Args)]
struct ClientUpdateArgs {
    #[arg(long)]
    company_name: Option<String>,
    #[arg(long)]
    website: Option<String>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    industry: Option<String>,
    #[arg(long)]
    monthly_budget: Option<f64>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    meta_app_id: Option<String>,
    #[arg(long)]
    meta_app_secret: Option<String>,
    #[arg(long)]
    google_client_id: Option<String>,
    #[arg(long)]
    google_client_secret: Option<String>,
    #[arg(long)]
    google_developer_token: Option<String>,
    #[arg(long)]
    ga4_property_id: Option<String>,
}

impl From<&ClientUpdateArgs> for ClientUpdate {
    fn from(args: &ClientUpdateArgs) -> Self {
        ClientUpdate {
            company_name: args.company_name.clone(),
            website: args.website.clone(),
            country: args.country.clone(),
            industry: args.industry.clone(),
            monthly_budget: args.monthly_budget,
            currency: args.currency.clone(),
            meta_app_id: args.meta_app_id.clone(),
            meta_app_secret: args.meta_app_secret.clone(),
            google_client_id: args.google_client_id.clone(),
            google_client_secret: args.google_client_secret.clone(),
            google_developer_token: args.google_developer_token.clone(),
            ga4_property_id: args.ga4_property_id.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.debug);

    let config = load_config(&cli)?;
    let token_path = match cli.token_path.clone().or_else(|| config.token_path.clone()) {
        Some(path) => path,
        None => FileTokenStorage::default_path()
            .context("Could not determine where to store the session token")?,
    };

    let api = ApiClient::from_config(&config).context("Invalid API configuration")?;
    let session = SessionStore::new(api, Arc::new(FileTokenStorage::new(token_path)));
    let mut notices = session.events().subscribe();

    let result = run(&cli, &config, &session).await;
    print_notices(&mut notices);
    result
}

/// Terminal filter: --debug > --verbose > FAGE_LOG / RUST_LOG > "warn"
fn init_tracing(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug,hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_env("FAGE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<FageConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => FageConfig::default_path()
            .map_err(|e| debug!(error = %e, "No config directory, using defaults"))
            .ok(),
    };

    let mut config = match path {
        Some(path) => FageConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FageConfig::default(),
    };

    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    Ok(config)
}

async fn run(cli: &Cli, config: &FageConfig, session: &Session) -> Result<()> {
    let Some(visibility) = cli.command.visibility() else {
        session
            .logout()
            .context("Failed to remove the stored session")?;
        println!("Logged out.");
        return Ok(());
    };

    match resolve_gate(session, visibility, cli.json).await? {
        GateDecision::Render => {}
        GateDecision::RedirectToLogin { .. } => {
            bail!("Not logged in. Run: fage login --email <email>")
        }
        GateDecision::RedirectToDashboard => {
            if let Some(user) = session.state().user() {
                eprintln!(
                    "Already logged in as {}. Run `fage logout` to switch accounts.",
                    user.email
                );
            }
            return run_status(cli, session).await;
        }
        GateDecision::Loading => bail!("Session check did not finish"),
    }

    match &cli.command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password.as_deref())?;
            let user = session
                .login(email, &password)
                .await
                .context("Login failed")?;
            report_signed_in(&user, cli.json);
            Ok(())
        }
        Command::Register {
            email,
            name,
            password,
        } => {
            let password = password_or_prompt(password.as_deref())?;
            let user = session
                .register(email, &password, name)
                .await
                .context("Registration failed")?;
            report_signed_in(&user, cli.json);
            Ok(())
        }
        Command::Logout => Ok(()),
        Command::Whoami => {
            let state = session.state();
            let user = state.user().context("Not logged in")?;
            println!("{}", cli::format_profile(user, cli.json));
            Ok(())
        }
        Command::Status => run_status(cli, session).await,
        Command::Accounts => {
            let api = authed(session)?;
            let accounts = session
                .observe(api.credential(), api.ad_accounts().await)
                .context("Failed to load ad accounts")?;
            println!("{}", cli::format_accounts(&accounts, cli.json, cli.no_color));
            Ok(())
        }
        Command::Connect {
            platform,
            no_browser,
        } => run_connect(cli, config, session, *platform, *no_browser).await,
        Command::Budget { action } => run_budget(cli, session, action.as_ref()).await,
        Command::Client { action } => run_client(cli, session, action.as_ref()).await,
        Command::Deploy { yes } => run_deploy(cli, session, *yes).await,
        Command::Pause => {
            let api = authed(session)?;
            let status = session
                .observe(api.credential(), api.automation_status().await)
                .context("Failed to load automation status")?;
            if !status.automation_status.can_pause() {
                bail!("Automation is not active");
            }
            let action = session
                .observe(api.credential(), api.pause().await)
                .context("Failed to pause automation")?;
            print_action(&action, cli.json);
            Ok(())
        }
        Command::Resume => {
            let api = authed(session)?;
            let status = session
                .observe(api.credential(), api.automation_status().await)
                .context("Failed to load automation status")?;
            if !status.automation_status.can_resume() {
                bail!("Automation is not paused");
            }
            let action = session
                .observe(api.credential(), api.resume().await)
                .context("Failed to resume automation")?;
            print_action(&action, cli.json);
            Ok(())
        }
        Command::Campaigns {
            status,
            platform,
            limit,
            offset,
        } => {
            let api = authed(session)?;
            let query = CampaignQuery {
                status: status.clone(),
                platform: platform.map(|p| p.as_str().to_string()),
                limit: Some(*limit),
                offset: Some(*offset),
            };
            let list = session
                .observe(api.credential(), api.campaigns(&query).await)
                .context("Failed to load campaigns")?;
            println!("{}", cli::format_campaigns(&list, cli.json, cli.no_color));
            Ok(())
        }
        Command::Logs { limit } => {
            let api = authed(session)?;
            let logs = session
                .observe(api.credential(), api.logs(*limit).await)
                .context("Failed to load optimization logs")?;
            println!("{}", cli::format_logs(&logs, cli.json, cli.no_color));
            Ok(())
        }
    }
}

/// Boot the session and wait for a settled gate decision, spinning while loading
async fn resolve_gate(
    session: &Session,
    visibility: RouteVisibility,
    quiet: bool,
) -> Result<GateDecision> {
    let mut guard = RouteGuard::new(session.subscribe(), visibility);
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        spinner("Checking session...")
    };

    let (outcome, decision) = tokio::join!(session.boot(), guard.settled());
    spinner.finish_and_clear();

    debug!(?outcome, ?decision, "Session resolved");
    decision.context("Session store closed before the session resolved")
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn authed(session: &Session) -> Result<AuthedClient> {
    Ok(session.backend().authed(session.credential()?))
}

fn password_or_prompt(password: Option<&str>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password.to_string());
    }

    eprint!("Password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let password = line.trim_end_matches(|c| c == '\r' || c == '\n');
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password.to_string())
}

fn report_signed_in(user: &fage_core::models::Profile, json: bool) {
    if json {
        println!("{}", cli::format_profile(user, true));
    } else {
        println!("Logged in as {} ({})", user.full_name, user.email);
    }
}

fn print_action(action: &AutomationAction, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(action).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!("{}", action.message);
    }
}

/// Surface session events that happened behind the command's back
fn print_notices(notices: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = notices.try_recv() {
        match event {
            SessionEvent::SignedOut(SignOutReason::Expired) => {
                eprintln!("Your session has expired. Log in again: fage login --email <email>")
            }
            SessionEvent::SignedOut(SignOutReason::Rejected) => {
                eprintln!("The stored session is no longer valid and has been removed.")
            }
            _ => {}
        }
    }
}

async fn run_status(cli: &Cli, session: &Session) -> Result<()> {
    let api = authed(session)?;
    let spinner = if cli.json {
        ProgressBar::hidden()
    } else {
        spinner("Loading dashboard...")
    };
    let (overview, report) = load_overview(session, &api).await;
    spinner.finish_and_clear();

    if report.has_fatal_errors() {
        bail!("Could not load the dashboard");
    }

    println!("{}", cli::format_overview(&overview, &report, cli.json));
    Ok(())
}

async fn run_connect(
    cli: &Cli,
    config: &FageConfig,
    session: &Session,
    platform: Platform,
    no_browser: bool,
) -> Result<()> {
    let api = authed(session)?;
    let flow = ConnectFlow::new(config.return_address, config.connect_timeout());

    let outcome = flow
        .run(session, &api, platform, |url| {
            if no_browser {
                eprintln!("Open this URL to connect {}:\n  {}", platform.display_name(), url);
            } else if let Err(e) = open::that(url) {
                warn!(error = %e, "Could not open a browser");
                eprintln!("Open this URL to continue:\n  {}", url);
            } else {
                eprintln!(
                    "Opened the {} consent screen in your browser.",
                    platform.display_name()
                );
            }
            eprintln!(
                "Waiting up to {}s for the browser to return...",
                config.connect_timeout_secs
            );
        })
        .await
        .with_context(|| format!("Failed to connect {}", platform.display_name()))?;

    match &outcome.result {
        ConnectResult::Connected if cli.json => {
            println!(
                "{}",
                serde_json::json!({"platform": outcome.platform, "connected": true})
            );
            Ok(())
        }
        ConnectResult::Connected => {
            println!("{}", outcome);
            Ok(())
        }
        ConnectResult::Error(_) => bail!("{}", outcome),
    }
}

async fn run_budget(cli: &Cli, session: &Session, action: Option<&BudgetAction>) -> Result<()> {
    match action.unwrap_or(&BudgetAction::Show) {
        BudgetAction::Show => {
            let api = authed(session)?;
            let (budget, client) = tokio::join!(api.budget(), api.client());
            let budget = session
                .observe(api.credential(), budget)
                .context("Failed to load budget settings")?;
            let currency = session
                .observe(api.credential(), client)
                .ok()
                .map(|c| c.currency);
            println!(
                "{}",
                cli::format_budget(&budget, currency.as_deref(), cli.json)
            );
            Ok(())
        }
        BudgetAction::Set {
            prospecting,
            retargeting,
            testing,
        } => {
            let allocation =
                BudgetAllocation::from_percentages(*prospecting, *retargeting, *testing);
            let valid = validate_allocation(&allocation)?;

            let api = authed(session)?;
            let saved = session
                .observe(api.credential(), api.save_allocation(valid).await)
                .context("Failed to save the budget allocation")?;
            if !cli.json {
                println!("Budget allocation saved.");
            }
            println!("{}", cli::format_budget(&saved, None, cli.json));
            Ok(())
        }
    }
}

async fn run_client(cli: &Cli, session: &Session, action: Option<&ClientAction>) -> Result<()> {
    let api = authed(session)?;
    let client = match action.unwrap_or(&ClientAction::Show) {
        ClientAction::Show => session
            .observe(api.credential(), api.client().await)
            .context("Failed to load the client profile")?,
        ClientAction::Set(args) => {
            let update = ClientUpdate::from(args);
            if update.is_empty() {
                bail!("Nothing to update. Pass at least one field, e.g. --monthly-budget 1500");
            }
            session
                .observe(api.credential(), api.update_client(&update).await)
                .context("Failed to update the client profile")?
        }
    };

    println!("{}", cli::format_client(&client, cli.json));
    Ok(())
}

async fn run_deploy(cli: &Cli, session: &Session, confirmed: bool) -> Result<()> {
    let api = authed(session)?;
    let spinner = if cli.json {
        ProgressBar::hidden()
    } else {
        spinner("Checking deploy readiness...")
    };
    let (overview, report) = load_overview(session, &api).await;
    spinner.finish_and_clear();

    if report.has_fatal_errors() {
        bail!("Could not check deploy readiness");
    }
    for error in &report.errors {
        eprintln!("warning: {}: {}", error.source, error.message);
    }

    let readiness = overview.readiness();
    let Some(permit) = readiness.permit() else {
        bail!("{}", cli::format_readiness(&readiness));
    };

    if !confirmed {
        println!("{}", cli::format_readiness(&readiness));
        bail!("Deploying automation cannot be undone. Re-run with --yes to confirm.");
    }

    let action = session
        .observe(api.credential(), api.deploy(permit).await)
        .context("Failed to deploy automation")?;
    print_action(&action, cli.json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_visibility() {
        let visibility = |args: &[&str]| {
            Cli::try_parse_from(args)
                .unwrap()
                .command
                .visibility()
        };

        assert_eq!(
            visibility(&["fage", "login", "--email", "a@b.c", "--password", "x"]),
            Some(RouteVisibility::Public)
        );
        assert_eq!(
            visibility(&["fage", "register", "-e", "a@b.c", "-n", "Ana", "--password", "x"]),
            Some(RouteVisibility::Public)
        );
        assert_eq!(visibility(&["fage", "logout"]), None);
        assert_eq!(
            visibility(&["fage", "status"]),
            Some(RouteVisibility::Protected)
        );
        assert_eq!(
            visibility(&["fage", "budget", "set", "50", "35", "15"]),
            Some(RouteVisibility::Protected)
        );
    }

    #[test]
    fn test_dashboard_alias_and_platform_parsing() {
        let cli = Cli::try_parse_from(["fage", "dashboard"]).unwrap();
        assert!(matches!(cli.command, Command::Status));

        let cli = Cli::try_parse_from(["fage", "connect", "Google", "--no-browser"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Connect {
                platform: Platform::Google,
                no_browser: true
            }
        ));

        assert!(Cli::try_parse_from(["fage", "connect", "tiktok"]).is_err());
    }

    #[test]
    fn test_client_set_builds_partial_update() {
        let cli = Cli::try_parse_from(["fage", "client", "set", "--monthly-budget", "1500"]).unwrap();
        let Command::Client {
            action: Some(ClientAction::Set(args)),
        } = &cli.command
        else {
            panic!("expected client set");
        };

        let update = ClientUpdate::from(args);
        assert_eq!(update.monthly_budget, Some(1500.0));
        assert!(update.company_name.is_none());
        assert!(!update.is_empty());
    }
}
