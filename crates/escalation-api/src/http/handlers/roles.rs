//! Role and permission administration handlers.

use axum::Json;
use axum::extract::{Path, State};

use escalation_types::rbac::{
    CreateRoleRequest, Permission, PermissionMatrix, Role, RoleHierarchyView, RoleId,
    RolePermissionsChange, RolePermissionsView, UpdateRoleHierarchyRequest,
    UpdateRolePermissionsRequest, permissions,
};

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<Vec<Permission>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_READ]).await?;

    let list = state.rbac_service.list_permissions().await?;
    Ok(timer.respond(list))
}

/// GET /api/v1/roles
pub async fn list_roles(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<Vec<Role>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_READ]).await?;

    let roles = state.rbac_service.list_roles().await?;
    Ok(timer
        .respond(roles)
        .with_link("hierarchy", "/api/v1/roles/hierarchy")
        .with_link("matrix", "/api/v1/roles/matrix"))
}

/// GET /api/v1/roles/hierarchy - Roles, edges and the inheritance tree.
pub async fn hierarchy(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<RoleHierarchyView>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_READ]).await?;

    let view = state.rbac_service.hierarchy().await?;
    Ok(timer.respond(view))
}

/// GET /api/v1/roles/matrix - Role x permission table.
pub async fn matrix(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<PermissionMatrix>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_READ]).await?;

    let matrix = state.rbac_service.matrix().await?;
    Ok(timer.respond(matrix))
}

/// GET /api/v1/roles/{id}/permissions - Direct and inherited permissions.
pub async fn role_permissions(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<RoleId>,
) -> Result<ApiResponse<RolePermissionsView>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_READ]).await?;

    let view = state.rbac_service.role_permissions(id).await?;
    Ok(timer.respond(view))
}

/// POST /api/v1/roles
pub async fn create_role(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<CreateRoleRequest>,
) -> Result<ApiResponse<Role>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_MANAGE]).await?;

    let role = state.rbac_service.create_role(caller.user.id, body).await?;
    let href = format!("/api/v1/roles/{}/permissions", role.id);
    Ok(timer.respond(role).with_link("permissions", &href).created())
}

/// PUT /api/v1/roles/{id}/permissions - Replace the direct permission set.
pub async fn update_role_permissions(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRolePermissionsRequest>,
) -> Result<ApiResponse<RolePermissionsChange>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_MANAGE]).await?;

    let change = state
        .rbac_service
        .update_role_permissions(caller.user.id, id, &body.permission_ids)
        .await?;
    Ok(timer.respond(change))
}

/// PUT /api/v1/roles/{id}/hierarchy - Set or clear the role it inherits from.
pub async fn update_role_hierarchy(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRoleHierarchyRequest>,
) -> Result<ApiResponse<RoleHierarchyView>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_MANAGE]).await?;

    state
        .rbac_service
        .update_role_hierarchy(caller.user.id, id, body.parent_role_id)
        .await?;
    let view = state.rbac_service.hierarchy().await?;
    Ok(timer.respond(view))
}

/// DELETE /api/v1/roles/{id}
pub async fn delete_role(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<RoleId>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::ROLE_MANAGE]).await?;

    state.rbac_service.delete_role(caller.user.id, id).await?;
    Ok(timer.respond(serde_json::json!({ "deleted": true, "id": id })))
}
