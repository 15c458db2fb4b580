//! CLI command definitions and dispatch for the `escl` binary.
//!
//! Uses clap derive macros for argument parsing. Administrative commands
//! (users, keys, leagues, roles) act as the bootstrap operator account.

pub mod key;
pub mod league;
pub mod role;
pub mod status;
pub mod user;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use indicatif::{ProgressBar, ProgressStyle};

use escalation_types::error::UserError;
use escalation_types::user::User;

use crate::http::extractors::auth::BOOTSTRAP_ADMIN_EMAIL;
use crate::state::AppState;

/// Run a league: players, pods, budgets and roles.
#[derive(Parser)]
#[command(name = "escl", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: escalation_observe::LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to config.toml or 3000).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config.toml or 127.0.0.1).
        #[arg(long)]
        host: Option<String>,

        /// Also export spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// System status dashboard.
    Status,

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: user::UserCommand,
    },

    /// Manage API keys.
    Key {
        #[command(subcommand)]
        action: key::KeyCommand,
    },

    /// Manage leagues.
    League {
        #[command(subcommand)]
        action: league::LeagueCommand,
    },

    /// Inspect roles and permissions.
    Role {
        #[command(subcommand)]
        action: role::RoleCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// The account CLI changes are attributed to.
pub async fn operator(state: &AppState) -> Result<User> {
    match state.user_service.get_by_email(BOOTSTRAP_ADMIN_EMAIL).await {
        Ok(user) => Ok(user),
        Err(UserError::NotFound) => bail!(
            "no operator account yet; run `escl key create` or `escl serve` once to create {BOOTSTRAP_ADMIN_EMAIL}"
        ),
        Err(e) => Err(e.into()),
    }
}

/// Steady-ticking spinner for slow operations.
pub fn spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

/// "1 league", "3 leagues".
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["escl", "serve", "--port", "8080", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Serve { port, host, otel } => {
                assert_eq!(port, Some(8080));
                assert!(host.is_none());
                assert!(!otel);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_role_check() {
        let cli =
            Cli::try_parse_from(["escl", "--json", "role", "check", "league_user", "pod_create"])
                .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Role {
                action: role::RoleCommand::Check { .. }
            }
        ));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "league"), "1 league");
        assert_eq!(plural(0, "league"), "0 leagues");
    }
}
