//! Activity log handlers (admin view).

use axum::extract::{Query, State};

use escalation_types::activity::ActivityLog;
use escalation_types::page::Page;
use escalation_types::rbac::permissions;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::ActivityListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/activity - Every entry, filterable by action, user and date range.
pub async fn list_activity(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<ActivityListQuery>,
) -> Result<ApiResponse<Page<ActivityLog>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ACTIVITY_LOGS_READ_ALL]).await?;

    let filter = query.filter()?;
    let page = state
        .activity_service
        .list_all(&filter, query.page, query.limit)
        .await?;
    Ok(timer.respond(page).with_link("self", "/api/v1/activity"))
}

/// GET /api/v1/activity/types - Distinct action names.
pub async fn action_types(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<Vec<String>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ACTIVITY_LOGS_READ_ALL]).await?;

    let types = state.activity_service.action_types().await?;
    Ok(timer.respond(types))
}
