//! API key CLI commands: create, list, revoke.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use crate::cli::plural;
use crate::http::extractors::auth::{BOOTSTRAP_ADMIN_EMAIL, ensure_api_key};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Issue a key for an account (the operator account by default).
    Create {
        /// Account email.
        #[arg(long)]
        email: Option<String>,
        /// Label shown in `escl key list`.
        #[arg(long, default_value = "cli")]
        name: String,
    },

    /// List keys of an account.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        email: Option<String>,
    },

    /// Revoke a key by id.
    Revoke {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(state: &AppState, action: KeyCommand, json: bool) -> Result<()> {
    match action {
        KeyCommand::Create { email, name } => create_key(state, email, &name, json).await,
        KeyCommand::List { email } => list_keys(state, email, json).await,
        KeyCommand::Revoke { id, force } => revoke_key(state, &id, force, json).await,
    }
}

async fn create_key(state: &AppState, email: Option<String>, name: &str, json: bool) -> Result<()> {
    // A fresh install gets its operator account and first key together.
    if email.is_none() {
        if let Some(plaintext) = ensure_api_key(state).await? {
            return print_key(BOOTSTRAP_ADMIN_EMAIL, &plaintext, json);
        }
    }

    let email = email.unwrap_or_else(|| BOOTSTRAP_ADMIN_EMAIL.to_string());
    let user = state.user_service.get_by_email(&email).await?;
    let (_, plaintext) = state.api_keys.create(user.id, name).await?;
    print_key(&user.email, &plaintext, json)
}

fn print_key(email: &str, plaintext: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "email": email, "api_key": plaintext }))?
        );
    } else {
        println!();
        println!(
            "  {} API key for {} (save this -- it won't be shown again):",
            style("🔑").bold(),
            style(email).bold()
        );
        println!();
        println!("  {}", style(plaintext).yellow().bold());
        println!();
    }
    Ok(())
}

async fn list_keys(state: &AppState, email: Option<String>, json: bool) -> Result<()> {
    let email = email.unwrap_or_else(|| BOOTSTRAP_ADMIN_EMAIL.to_string());
    let user = state.user_service.get_by_email(&email).await?;
    let keys = state.api_keys.list_for_user(user.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    if keys.is_empty() {
        println!();
        println!(
            "  {} No keys for {}. Issue one with: {}",
            style("i").blue().bold(),
            email,
            style(format!("escl key create --email {email}")).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Last used").fg(Color::White),
    ]);
    for key in &keys {
        table.add_row(vec![
            Cell::new(&key.id).fg(Color::DarkGrey),
            Cell::new(&key.name).fg(Color::Cyan),
            Cell::new(key.created_at.format("%Y-%m-%d").to_string()),
            Cell::new(
                key.last_used_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            )
            .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(keys.len(), "key"));
    println!();
    Ok(())
}

async fn revoke_key(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Revoke API key {}?", style(id).red().bold()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.api_keys.revoke(id).await?;

    if json {
        println!("{}", serde_json::json!({ "revoked": true, "id": id }));
    } else {
        println!("  {} Revoked key {}", style("✓").green().bold(), style(id).bold());
    }
    Ok(())
}
