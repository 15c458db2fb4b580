//! League CLI commands: create, list, activate.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use escalation_types::league::{CreateLeagueRequest, LeagueId};
use escalation_types::money::Money;

use crate::cli::{operator, plural, spinner};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum LeagueCommand {
    /// Create a league season.
    Create {
        name: String,
        /// First day (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
        /// Weekly budget in dollars.
        #[arg(long, default_value_t = 0.0)]
        budget: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        max_players: Option<i64>,
    },

    /// List leagues with their current week.
    #[command(alias = "ls")]
    List,

    /// Make a league the active one.
    Activate { id: LeagueId },
}

pub async fn run(state: &AppState, action: LeagueCommand, json: bool) -> Result<()> {
    match action {
        LeagueCommand::Create {
            name,
            start,
            end,
            budget,
            description,
            max_players,
        } => {
            let request = CreateLeagueRequest {
                name,
                description,
                start_date: start,
                end_date: end,
                weekly_budget: Money::from_dollars(budget),
                league_code: None,
                max_players,
                points_per_win: None,
                points_per_loss: None,
                points_per_draw: None,
            };
            create_league(state, request, json).await
        }
        LeagueCommand::List => list_leagues(state, json).await,
        LeagueCommand::Activate { id } => activate_league(state, id, json).await,
    }
}

async fn create_league(state: &AppState, request: CreateLeagueRequest, json: bool) -> Result<()> {
    let actor = operator(state).await?;
    let league = state.league_service.create_league(actor.id, request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&league)?);
    } else {
        println!(
            "  {} Created league {} (id {}, {} to {}, {}/week)",
            style("✓").green().bold(),
            style(&league.name).bold(),
            league.id,
            league.start_date,
            league.end_date,
            league.weekly_budget
        );
        println!(
            "  Activate it with: {}",
            style(format!("escl league activate {}", league.id)).yellow()
        );
    }
    Ok(())
}

async fn list_leagues(state: &AppState, json: bool) -> Result<()> {
    let leagues = state.league_service.list_leagues().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&leagues)?);
        return Ok(());
    }

    if leagues.is_empty() {
        println!();
        println!(
            "  {} No leagues yet. Create one with: {}",
            style("i").blue().bold(),
            style("escl league create \"Spring\" --start 2025-01-03 --end 2025-03-28").yellow()
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
        Cell::new("Dates").fg(Color::White),
        Cell::new("Week").fg(Color::White),
        Cell::new("Budget").fg(Color::White),
        Cell::new("Active").fg(Color::White),
    ]);
    for league in &leagues {
        let week = match state.league_service.week(league) {
            Ok(week) => format!("{}/{}", week.current_week, week.max_week),
            Err(e) => {
                tracing::warn!(league_id = %league.id, "cannot compute league week: {e}");
                "-".to_string()
            }
        };
        let active = if league.is_active {
            Cell::new("●").fg(Color::Green)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(league.id).fg(Color::DarkGrey),
            Cell::new(&league.name).fg(Color::Cyan),
            Cell::new(format!("{} → {}", league.start_date, league.end_date)),
            Cell::new(week),
            Cell::new(league.weekly_budget),
            active,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(leagues.len(), "league"));
    println!();
    Ok(())
}

async fn activate_league(state: &AppState, id: LeagueId, json: bool) -> Result<()> {
    let actor = operator(state).await?;

    let progress = if json { None } else { Some(spinner("Activating league...")?) };
    let league = state.league_service.set_active(actor.id, id).await?;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&league)?);
    } else {
        println!(
            "  {} {} is now the active league",
            style("✓").green().bold(),
            style(&league.name).bold()
        );
    }
    Ok(())
}
