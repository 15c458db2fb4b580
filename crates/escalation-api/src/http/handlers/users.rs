//! User account handlers: the caller's own profile and user administration.

use axum::Json;
use axum::extract::{Path, Query, State};

use escalation_types::activity::ActivityLog;
use escalation_types::page::Page;
use escalation_types::rbac::permissions;
use escalation_types::user::{
    ChangeRoleRequest, CreateUserRequest, UpdateProfileRequest, User, UserId, UserProfile,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::{PageQuery, UserListQuery};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

async fn profile(state: &AppState, user: User) -> Result<UserProfile, AppError> {
    let leagues = state.league_service.user_enrollments(user.id).await?;
    Ok(UserProfile { user, leagues })
}

/// GET /api/v1/users/me - The caller's profile with league enrollments.
pub async fn get_me(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::AUTH_VIEW_PROFILE]).await?;

    let profile = profile(&state, caller.user).await?;
    Ok(timer.respond(profile).with_link("self", "/api/v1/users/me"))
}

/// PUT /api/v1/users/me - Update the caller's email or names.
pub async fn update_me(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::AUTH_UPDATE_PROFILE]).await?;

    let user = state.user_service.update_profile(caller.user.id, body).await?;
    Ok(timer.respond(user).with_link("self", "/api/v1/users/me"))
}

/// DELETE /api/v1/users/me - Soft-delete the caller's account.
pub async fn delete_me(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::AUTH_DELETE_ACCOUNT]).await?;

    state.user_service.delete_account(caller.user.id).await?;
    Ok(timer.respond(serde_json::json!({ "deleted": true, "id": caller.user.id })))
}

/// GET /api/v1/users/me/activity - The caller's own activity log.
pub async fn my_activity(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Page<ActivityLog>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ACTIVITY_LOGS_READ_OWN]).await?;

    let page = state
        .activity_service
        .list_for_user(caller.user.id, query.page, query.limit)
        .await?;
    Ok(timer.respond(page))
}

/// GET /api/v1/users/me/permissions - Effective permission names of the caller's role.
pub async fn my_permissions(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();

    let names = state
        .rbac_service
        .effective_permission_names(caller.user.role_id)
        .await?;
    Ok(timer.respond(serde_json::json!({
        "role_id": caller.user.role_id,
        "role_name": caller.user.role_name,
        "permissions": names,
    })))
}

/// GET /api/v1/users - Paginated user list.
pub async fn list_users(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<UserListQuery>,
) -> Result<ApiResponse<Page<User>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ADMIN_USER_READ]).await?;

    let page = state
        .user_service
        .list_users(&query.filter(), query.page, query.limit)
        .await?;
    Ok(timer.respond(page).with_link("self", "/api/v1/users"))
}

/// POST /api/v1/users - Create an account.
pub async fn create_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ADMIN_USER_CREATE]).await?;

    let user = state.user_service.create_user(Some(caller.user.id), body).await?;
    let href = format!("/api/v1/users/{}", user.id);
    Ok(timer.respond(user).with_link("self", &href).created())
}

/// GET /api/v1/users/{id} - A user's profile.
pub async fn get_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ADMIN_USER_READ]).await?;

    let user = state.user_service.get_user(id).await?;
    let profile = profile(&state, user).await?;
    Ok(timer
        .respond(profile)
        .with_link("activity", &format!("/api/v1/users/{id}/activity")))
}

/// PUT /api/v1/users/{id}/role - Change a user's role.
pub async fn change_role(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<UserId>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ADMIN_USER_UPDATE]).await?;
    if id == caller.user.id {
        return Err(AppError::Validation("You cannot change your own role".to_string()));
    }

    let user = state.user_service.change_role(caller.user.id, id, body.role_id).await?;
    Ok(timer.respond(user))
}

/// POST /api/v1/users/{id}/activate
pub async fn activate_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<User>, AppError> {
    set_active(state, caller, id, true).await
}

/// POST /api/v1/users/{id}/deactivate
pub async fn deactivate_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<User>, AppError> {
    set_active(state, caller, id, false).await
}

async fn set_active(
    state: AppState,
    caller: CurrentUser,
    id: UserId,
    active: bool,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ADMIN_USER_UPDATE]).await?;
    if !active && id == caller.user.id {
        return Err(AppError::Validation("You cannot deactivate your own account".to_string()));
    }

    let user = state.user_service.set_active(caller.user.id, id, active).await?;
    Ok(timer.respond(user))
}

/// GET /api/v1/users/{id}/activity - Activity of one user (404 for unknown users).
pub async fn user_activity(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<UserId>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Page<ActivityLog>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ACTIVITY_LOGS_READ_ALL]).await?;

    state.user_service.get_user(id).await?;
    let page = state
        .activity_service
        .list_all(
            &escalation_types::activity::ActivityFilter {
                user_id: Some(id),
                ..Default::default()
            },
            query.page,
            query.limit,
        )
        .await?;
    Ok(timer.respond(page))
}
