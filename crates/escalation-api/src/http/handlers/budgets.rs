//! Budget handlers.
//!
//! Callers holding `budget_manage_league` may read and adjust any budget;
//! everyone else is limited to their own.

use axum::Json;
use axum::extract::{Path, State};

use escalation_core::service::budget::BudgetAccess;
use escalation_types::budget::{
    AddCardRequest, Budget, BudgetCard, BudgetCardId, BudgetId, BudgetSummary, BudgetView,
    UpdateBudgetRequest, UpdateCardRequest,
};
use escalation_types::rbac::permissions;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

async fn access(state: &AppState, caller: &CurrentUser) -> Result<BudgetAccess, AppError> {
    if caller.has(state, permissions::BUDGET_MANAGE_LEAGUE).await? {
        Ok(BudgetAccess::Admin)
    } else {
        caller.require(state, &[permissions::BUDGET_READ]).await?;
        Ok(BudgetAccess::Owner(caller.user.id))
    }
}

/// GET /api/v1/budgets/{id}
pub async fn get_budget(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<BudgetId>,
) -> Result<ApiResponse<BudgetView>, AppError> {
    let timer = RequestTimer::start();
    let access = access(&state, &caller).await?;

    let budget = state.budget_service.get_budget_by_id(access, id).await?;
    Ok(timer
        .respond(budget)
        .with_link("cards", &format!("/api/v1/budgets/{id}/cards"))
        .with_link("summary", &format!("/api/v1/budgets/{id}/summary")))
}

/// PUT /api/v1/budgets/{id} - Admin adjustment of used/available totals.
pub async fn update_budget(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<BudgetId>,
    Json(body): Json<UpdateBudgetRequest>,
) -> Result<ApiResponse<Budget>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_MANAGE_LEAGUE]).await?;

    let budget = state.budget_service.update_budget(caller.user.id, id, body).await?;
    Ok(timer.respond(budget))
}

/// GET /api/v1/budgets/{id}/cards - Newest first.
pub async fn list_cards(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<BudgetId>,
) -> Result<ApiResponse<Vec<BudgetCard>>, AppError> {
    let timer = RequestTimer::start();
    let access = access(&state, &caller).await?;

    let cards = state.budget_service.list_cards(access, id).await?;
    Ok(timer.respond(cards))
}

/// POST /api/v1/budgets/{id}/cards
pub async fn add_card(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<BudgetId>,
    Json(body): Json<AddCardRequest>,
) -> Result<ApiResponse<BudgetCard>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_MANAGE]).await?;

    let card = state.budget_service.add_card(caller.user.id, id, body).await?;
    Ok(timer.respond(card).created())
}

/// PUT /api/v1/budgets/{id}/cards/{card_id} - Change quantity or notes.
pub async fn update_card(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path((id, card_id)): Path<(BudgetId, BudgetCardId)>,
    Json(body): Json<UpdateCardRequest>,
) -> Result<ApiResponse<BudgetCard>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_MANAGE]).await?;

    let card = state
        .budget_service
        .update_card(caller.user.id, id, card_id, body)
        .await?;
    Ok(timer.respond(card))
}

/// DELETE /api/v1/budgets/{id}/cards/{card_id} - Remove a card and refund its cost.
pub async fn remove_card(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path((id, card_id)): Path<(BudgetId, BudgetCardId)>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::BUDGET_MANAGE]).await?;

    let refunded = state
        .budget_service
        .remove_card(caller.user.id, id, card_id)
        .await?;
    Ok(timer.respond(serde_json::json!({ "removed": true, "refunded": refunded })))
}

/// GET /api/v1/budgets/{id}/summary - Per-week rollover table.
pub async fn summary(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<BudgetId>,
) -> Result<ApiResponse<BudgetSummary>, AppError> {
    let timer = RequestTimer::start();
    let access = access(&state, &caller).await?;

    let summary = state.budget_service.summary(access, id).await?;
    Ok(timer.respond(summary))
}
