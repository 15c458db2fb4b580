//! System status dashboard command.

use anyhow::Result;
use console::style;

use escalation_types::error::LeagueError;
use escalation_types::user::UserFilter;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows account and league counts, the active league's week, and where
/// data lives.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let users = state
        .user_service
        .list_users(&UserFilter::default(), Some(1), Some(1))
        .await?
        .pagination
        .total;
    let leagues = state.league_service.list_leagues().await?;
    let roles = state.rbac_service.list_roles().await?.len();
    let has_key = state.api_keys.any_exists().await?;

    let active = match state.league_service.active_league().await {
        Ok(league) => {
            let week = state.league_service.week(&league)?;
            Some((league, week))
        }
        Err(LeagueError::NoActiveLeague) => None,
        Err(e) => return Err(e.into()),
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "users": users,
            "leagues": leagues.len(),
            "roles": roles,
            "api_key_configured": has_key,
            "active_league": active.as_ref().map(|(league, week)| serde_json::json!({
                "id": league.id,
                "name": league.name,
                "current_week": week.current_week,
                "max_week": week.max_week,
                "adds_locked": week.adds_locked,
            })),
            "timezone": state.config.calendar.timezone,
            "cache_enabled": state.config.cache.enabled,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Escalation League v{}",
        style("⚔").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── League ──").dim());
    match &active {
        Some((league, week)) => {
            println!("  Active:   {}", style(&league.name).green().bold());
            println!(
                "  Week:     {} of {}",
                style(week.current_week).bold(),
                week.max_week
            );
            if week.adds_locked {
                println!("  Adds:     {}", style("locked until next cutoff").yellow());
            }
            if let Some(cutoff) = week.next_cutoff {
                println!("  Cutoff:   {}", style(cutoff.to_rfc3339()).dim());
            }
        }
        None => println!("  Active:   {}", style("none").yellow()),
    }
    println!("  Seasons:  {}", leagues.len());
    println!();

    println!("  {}", style("── Accounts ──").dim());
    println!("  Users:    {}", style(users).bold());
    println!("  Roles:    {}", roles);
    if !has_key {
        println!(
            "  API key:  {} (run {})",
            style("none").yellow(),
            style("escl key create").yellow()
        );
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!("  Timezone: {}", style(&state.config.calendar.timezone).dim());
    println!();

    Ok(())
}
