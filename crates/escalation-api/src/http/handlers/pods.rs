//! Pod (game) handlers: filling pods, reporting results and admin overrides.

use axum::Json;
use axum::extract::{Path, Query, State};

use escalation_types::pod::{
    AdminUpdatePodRequest, CreatePodRequest, DeclareResultRequest, PodDetails, PodId,
    SetResultRequest,
};
use escalation_types::rbac::permissions;
use escalation_types::user::UserId;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::PodListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

fn pod_href(id: PodId) -> String {
    format!("/api/v1/pods/{id}")
}

/// GET /api/v1/pods - Filter by league, status or player.
pub async fn list_pods(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<PodListQuery>,
) -> Result<ApiResponse<Vec<PodDetails>>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_READ]).await?;

    let pods = state.pod_service.list_pods(query.filter()?).await?;
    Ok(timer.respond(pods).with_link("self", "/api/v1/pods"))
}

/// POST /api/v1/pods - Open a pod; the caller takes the first seat.
pub async fn create_pod(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<CreatePodRequest>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_CREATE]).await?;

    let pod = state.pod_service.create_pod(caller.user.id, body.league_id).await?;
    let href = pod_href(pod.pod.id);
    Ok(timer.respond(pod).with_link("self", &href).created())
}

/// GET /api/v1/pods/{id}
pub async fn get_pod(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_READ]).await?;

    let pod = state.pod_service.get_pod(id).await?;
    Ok(timer.respond(pod).with_link("self", &pod_href(id)))
}

/// POST /api/v1/pods/{id}/join
pub async fn join_pod(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_UPDATE]).await?;

    let pod = state.pod_service.join_pod(caller.user.id, id).await?;
    Ok(timer.respond(pod))
}

/// POST /api/v1/pods/{id}/result - Declare a winner or a draw.
pub async fn declare_result(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
    Json(body): Json<DeclareResultRequest>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_UPDATE]).await?;

    let pod = state.pod_service.declare_result(caller.user.id, id, body).await?;
    Ok(timer.respond(pod))
}

/// POST /api/v1/pods/{id}/confirm - Confirm the declared result.
pub async fn confirm_result(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_UPDATE]).await?;

    let pod = state.pod_service.confirm_result(caller.user.id, id).await?;
    Ok(timer.respond(pod))
}

/// PUT /api/v1/pods/{id} - Override participants, results or status.
pub async fn admin_update(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
    Json(body): Json<AdminUpdatePodRequest>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_MANAGE]).await?;

    let pod = state.pod_service.admin_update(caller.user.id, id, body).await?;
    Ok(timer.respond(pod))
}

/// DELETE /api/v1/pods/{id}/participants/{user_id}
pub async fn remove_participant(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path((id, user_id)): Path<(PodId, UserId)>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_MANAGE]).await?;

    let pod = state
        .pod_service
        .remove_participant(caller.user.id, id, user_id)
        .await?;
    Ok(timer.respond(pod))
}

/// PUT /api/v1/pods/{id}/participants/{user_id}/result
pub async fn set_participant_result(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path((id, user_id)): Path<(PodId, UserId)>,
    Json(body): Json<SetResultRequest>,
) -> Result<ApiResponse<PodDetails>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_MANAGE]).await?;

    let pod = state
        .pod_service
        .set_participant_result(caller.user.id, id, user_id, body.result)
        .await?;
    Ok(timer.respond(pod))
}

/// DELETE /api/v1/pods/{id} - Soft delete; stats of complete pods are reversed.
pub async fn delete_pod(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<PodId>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::POD_DELETE]).await?;

    state.pod_service.delete_pod(caller.user.id, id).await?;
    Ok(timer.respond(serde_json::json!({ "deleted": true, "id": id })))
}
