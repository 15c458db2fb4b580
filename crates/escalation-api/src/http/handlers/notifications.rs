//! Notification handlers: the caller's inbox plus admin sends.

use axum::Json;
use axum::extract::{Path, Query, State};

use escalation_types::notification::{
    BulkNotificationRequest, NewNotification, Notification, NotificationId, NotificationList,
    SendNotificationRequest,
};
use escalation_types::rbac::permissions;

use crate::http::error::AppError;
use crate::http::extractors::auth::CurrentUser;
use crate::http::extractors::query::NotificationListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/notifications - The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: CurrentUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<ApiResponse<NotificationList>, AppError> {
    let timer = RequestTimer::start();

    let list = state
        .notification_service
        .list(caller.user.id, query.unread_only, query.limit, query.offset)
        .await?;
    Ok(timer.respond(list).with_link("self", "/api/v1/notifications"))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();

    let count = state.notification_service.unread_count(caller.user.id).await?;
    Ok(timer.respond(serde_json::json!({ "unread": count })))
}

/// PUT /api/v1/notifications/{id}/read - Idempotent.
pub async fn mark_read(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<NotificationId>,
) -> Result<ApiResponse<Notification>, AppError> {
    let timer = RequestTimer::start();

    let notification = state.notification_service.mark_read(caller.user.id, id).await?;
    Ok(timer.respond(notification))
}

/// PUT /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();

    let updated = state.notification_service.mark_all_read(caller.user.id).await?;
    Ok(timer.respond(serde_json::json!({ "updated": updated })))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(id): Path<NotificationId>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();

    state.notification_service.delete(caller.user.id, id).await?;
    Ok(timer.respond(serde_json::json!({ "deleted": true, "id": id })))
}

/// POST /api/v1/notifications - Send to one user.
pub async fn send_notification(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<SendNotificationRequest>,
) -> Result<ApiResponse<Notification>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::NOTIFICATION_SEND]).await?;

    state.user_service.get_user(body.user_id).await?;
    let notification = state
        .notification_service
        .send(body.user_id, &body.notification)
        .await?;
    Ok(timer.respond(notification).created())
}

/// POST /api/v1/notifications/bulk - Send the same notification to many users.
pub async fn send_bulk(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<BulkNotificationRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::NOTIFICATION_SEND]).await?;

    let sent = state
        .notification_service
        .send_bulk(&body.user_ids, &body.notification)
        .await?;
    Ok(timer.respond(serde_json::json!({ "sent": sent })).created())
}

/// POST /api/v1/notifications/admins - Send to every active league admin.
pub async fn notify_admins(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(body): Json<NewNotification>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let timer = RequestTimer::start();
    caller.require(&state, &[permissions::NOTIFICATION_SEND]).await?;

    let sent = state.notification_service.notify_admins(&body).await?;
    Ok(timer.respond(serde_json::json!({ "sent": sent })).created())
}
