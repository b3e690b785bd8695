//! laps-cli - Intune macOS LAPS admin console
//!
//! Lists Intune-managed macOS devices and retrieves/rotates their
//! local-admin passwords stored in Azure Key Vault.

mod api;
mod auth;
mod config;
mod models;
mod password;
mod state;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::ApiClient;
use auth::{AzureAdProvider, CredentialBroker};
use config::{CredentialCache, Settings};
use state::ConsoleState;

#[derive(Parser)]
#[command(name = "laps-cli")]
#[command(about = "Admin console for Intune-managed macOS local-admin passwords", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to Azure AD
    Login {
        /// Force interactive sign-in even if cached credentials exist
        #[arg(short, long)]
        force: bool,
    },

    /// Sign out and clear cached credentials
    Logout,

    /// Show the signed-in account and cached token status
    Status,

    /// List Intune-managed macOS devices
    Devices {
        /// Show the full directory record per device
        #[arg(short, long)]
        detail: bool,
    },

    /// Retrieve or rotate a device's local-admin password
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },

    /// Run the on-demand remediation script on a device
    Remediate {
        /// Intune managedDevice id (from `devices` output)
        device_id: String,
    },
}

#[derive(Subcommand)]
enum PasswordAction {
    /// Fetch the stored password for a device serial number
    Get { serial: String },

    /// Generate, store, and print a new password for a device serial number
    Rotate { serial: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Required settings; the console cannot run without them.
    let settings = Settings::load().context("cannot start without required settings")?;
    let cache = CredentialCache::load()?;
    let provider = AzureAdProvider::new(&settings)?;

    let broker = Arc::new(CredentialBroker::new(Box::new(provider), cache));
    let client = ApiClient::new(broker.clone(), &settings);

    match cli.command {
        Commands::Login { force } => {
            login(&broker, &settings, force).await?;
        }
        Commands::Logout => {
            broker.sign_out();
            println!("Signed out.");
        }
        Commands::Status => {
            status(&broker);
        }
        Commands::Devices { detail } => {
            show_devices(&client, detail).await?;
        }
        Commands::Password { action } => match action {
            PasswordAction::Get { serial } => {
                show_password(&client, &serial, false).await?;
            }
            PasswordAction::Rotate { serial } => {
                show_password(&client, &serial, true).await?;
            }
        },
        Commands::Remediate { device_id } => {
            remediate(&client, &settings, &device_id).await?;
        }
    }

    Ok(())
}

async fn login(broker: &CredentialBroker, settings: &Settings, force: bool) -> Result<()> {
    if force {
        tracing::info!("--force: discarding cached credentials");
        broker.sign_out();
    }

    broker
        .acquire_token(std::slice::from_ref(&settings.graph_scope))
        .await
        .context("sign-in failed")?;

    match broker.account() {
        Some(account) => println!(
            "Signed in as {} ({}).",
            account.username.as_deref().unwrap_or("unknown"),
            account.id
        ),
        None => println!("Signed in."),
    }
    Ok(())
}

fn status(broker: &CredentialBroker) {
    let snapshot = broker.cache_snapshot();

    match &snapshot.account {
        Some(account) => {
            println!(
                "Account:     {} ({})",
                account.username.as_deref().unwrap_or("unknown"),
                account.id
            );
        }
        None => println!("Account:     none"),
    }

    match &snapshot.refresh_token {
        Some(_) => println!("Refresh tok: present"),
        None => println!("Refresh tok: none"),
    }

    let mut scopes: Vec<_> = snapshot.tokens.iter().collect();
    scopes.sort_by(|a, b| a.0.cmp(b.0));
    for (scope, token) in scopes {
        let label = if token.is_expired() { "expired" } else { "valid" };
        println!("Token [{}]: {}", scope, label);
        if let Some(exp) = token.expires_at {
            println!("  expires_at: {}", exp);
        }
    }

    if snapshot.account.is_none() {
        println!("\nRun 'laps-cli login' to authenticate.");
    }
}

async fn show_devices(client: &ApiClient, detail: bool) -> Result<()> {
    let mut state = ConsoleState::default();
    if !state.begin("devices") {
        return Ok(());
    }
    let result = api::devices::list_devices(client).await;
    state.apply_device_list(result);
    state.finish("devices");

    if let Some(err) = state.error() {
        bail!("{err}");
    }

    println!("\nManaged macOS devices:");
    println!("{:-<78}", "");

    if state.devices().is_empty() {
        println!("  (no devices found)");
        return Ok(());
    }

    for device in state.devices() {
        let compliance = device
            .compliance_state
            .map(|c| c.as_str())
            .unwrap_or("unknown");
        println!(
            "{:<28} {:<14} {:<10} {:<13} {}",
            device.label(),
            device.serial_number.as_deref().unwrap_or("-"),
            device.os_version.as_deref().unwrap_or("-"),
            compliance,
            device.last_sync_date_time.as_deref().unwrap_or("never"),
        );

        if detail {
            println!("  ID:           {}", device.id);
            println!(
                "  OS:           {}",
                device.operating_system.as_deref().unwrap_or("-")
            );
            println!(
                "  Type:         {}",
                device.device_type.as_deref().unwrap_or("-")
            );
            println!(
                "  User:         {}",
                device.user_principal_name.as_deref().unwrap_or("-")
            );
            println!(
                "  Registration: {}",
                device.device_registration_state.as_deref().unwrap_or("-")
            );
            println!(
                "  Management:   {} (agent: {}, owner: {})",
                device.management_state.as_deref().unwrap_or("-"),
                device.management_agent.as_deref().unwrap_or("-"),
                device.owner_type.as_deref().unwrap_or("-")
            );
            println!(
                "  Enrolled:     {} ({})",
                device.enrolled_date_time.as_deref().unwrap_or("-"),
                device.device_enrollment_type.as_deref().unwrap_or("-")
            );
            println!();
        }
    }

    if let Some(message) = state.message() {
        println!("\n{message}");
    }

    Ok(())
}

async fn show_password(client: &ApiClient, serial: &str, rotate: bool) -> Result<()> {
    let mut state = ConsoleState::default();
    let op = format!("password:{serial}");
    if !state.begin(&op) {
        return Ok(());
    }

    let result = if rotate {
        password::generate_and_store(client, serial).await
    } else {
        password::retrieve(client, serial).await
    };
    state.apply_password(serial, result);
    state.finish(&op);

    if let Some(err) = state.error() {
        bail!("{err}");
    }

    // Clear text goes to stdout only; it is never logged.
    if let Some(pwd) = state.password(serial) {
        if rotate {
            println!("New password for {}: {}", serial, pwd);
            println!("(stored in Key Vault, expires in 90 days)");
        } else {
            println!("Password for {}: {}", serial, pwd);
        }
    }

    Ok(())
}

async fn remediate(client: &ApiClient, settings: &Settings, device_id: &str) -> Result<()> {
    match api::devices::run_remediation(client, device_id, &settings.script_policy_id).await {
        Ok(()) => {
            println!("Remediation triggered on {}.", device_id);
            Ok(())
        }
        Err(e) => bail!("Remediation failed: {e}"),
    }
}
