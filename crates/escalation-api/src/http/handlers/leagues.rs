//! League handlers: CRUD, enrollment, standings and the caller's league budget.

use axum::Json;
use axum::extract::{Path, Query, State};

use escalation_types::budget::BudgetView;
use escalation_types::league::{
    CreateLeagueRequest, Enrollment, LeaderboardEntry, League, LeagueDetails, LeagueId,
    LeagueStats, UpdateEnrollmentRequest, UpdateLeagueRequest,
};
use escalation_types::rbac::permissions;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::SearchQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/leagues - All leagues, newest start date first.
pub async fn list_leagues(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<Vec<League>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_READ]).await?;

    let leagues = state.league_service.list_leagues().await?;
    Ok(timer.respond(leagues).with_link("self", "/api/v1/leagues"))
}

/// GET /api/v1/leagues/search?q=
pub async fn search_leagues(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<ApiResponse<Vec<League>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_READ]).await?;

    let leagues = state.league_service.search(&query.q).await?;
    Ok(timer.respond(leagues))
}

/// POST /api/v1/leagues - Create a league.
pub async fn create_league(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<CreateLeagueRequest>,
) -> Result<ApiResponse<League>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_CREATE]).await?;

    let league = state.league_service.create_league(caller.user.id, body).await?;
    let href = format!("/api/v1/leagues/{}", league.id);
    Ok(timer.respond(league).with_link("self", &href).created())
}

/// GET /api/v1/leagues/active - The active league with its current week.
pub async fn active_league(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<LeagueDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_ACTIVE]).await?;

    let league = state.league_service.active_league().await?;
    let details = state.league_service.details(league).await?;
    let href = format!("/api/v1/leagues/{}", details.league.id);
    Ok(timer.respond(details).with_link("league", &href))
}

/// GET /api/v1/leagues/{id} - League with week info and participant count.
pub async fn get_league(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<LeagueDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_DETAILS]).await?;

    let details = state.league_service.league_details(id).await?;
    Ok(timer
        .respond(details)
        .with_link("self", &format!("/api/v1/leagues/{id}"))
        .with_link("participants", &format!("/api/v1/leagues/{id}/participants"))
        .with_link("leaderboard", &format!("/api/v1/leagues/{id}/leaderboard")))
}

/// PUT /api/v1/leagues/{id} - Partial update.
pub async fn update_league(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
    Json(body): Json<UpdateLeagueRequest>,
) -> Result<ApiResponse<League>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_UPDATE]).await?;

    let league = state.league_service.update_league(caller.user.id, id, body).await?;
    Ok(timer.respond(league))
}

/// POST /api/v1/leagues/{id}/activate - Make this the single active league.
pub async fn activate_league(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<League>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_SET_ACTIVE]).await?;

    let league = state.league_service.set_active(caller.user.id, id).await?;
    Ok(timer.respond(league))
}

/// POST /api/v1/leagues/{id}/signup - Enroll the caller.
pub async fn signup(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<Enrollment>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_SIGNUP]).await?;

    let enrollment = state.league_service.signup(&caller.user, id).await?;
    Ok(timer.respond(enrollment).created())
}

/// DELETE /api/v1/leagues/{id}/signup - Leave the league.
pub async fn leave(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_LEAVE]).await?;

    state.league_service.leave(caller.user.id, id).await?;
    Ok(timer.respond(serde_json::json!({ "left": true, "league_id": id })))
}

/// GET /api/v1/leagues/{id}/enrollment - The caller's own enrollment.
pub async fn get_enrollment(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<Enrollment>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_DETAILS]).await?;

    let enrollment = state.league_service.enrollment(caller.user.id, id).await?;
    Ok(timer.respond(enrollment))
}

/// PUT /api/v1/leagues/{id}/enrollment - Update commander or decklist.
pub async fn update_enrollment(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
    Json(body): Json<UpdateEnrollmentRequest>,
) -> Result<ApiResponse<Enrollment>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_LEAVE]).await?;

    let enrollment = state
        .league_service
        .update_enrollment(caller.user.id, id, body)
        .await?;
    Ok(timer.respond(enrollment))
}

/// GET /api/v1/leagues/{id}/participants
pub async fn participants(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<Vec<Enrollment>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_DETAILS]).await?;

    let participants = state.league_service.participants(id).await?;
    Ok(timer.respond(participants))
}

/// GET /api/v1/leagues/{id}/stats
pub async fn stats(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<LeagueStats>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_DETAILS]).await?;

    let stats = state.league_service.stats(id).await?;
    Ok(timer.respond(stats))
}

/// GET /api/v1/leagues/{id}/leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<Vec<LeaderboardEntry>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::LEAGUE_VIEW_DETAILS]).await?;

    let board = state.league_service.leaderboard(id).await?;
    Ok(timer.respond(board))
}

/// GET /api/v1/leagues/{id}/budget - The caller's budget in this league.
pub async fn get_budget(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<BudgetView>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_READ]).await?;

    let budget = state.budget_service.get_budget(caller.user.id, id).await?;
    let href = format!("/api/v1/budgets/{}", budget.budget.id);
    Ok(timer.respond(budget).with_link("budget", &href))
}

/// POST /api/v1/leagues/{id}/budget - Open the caller's budget in this league.
pub async fn create_budget(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<LeagueId>,
) -> Result<ApiResponse<BudgetView>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_MANAGE]).await?;

    let budget = state.budget_service.create_budget(caller.user.id, id).await?;
    let href = format!("/api/v1/budgets/{}", budget.budget.id);
    Ok(timer.respond(budget).with_link("budget", &href).created())
}
