//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use escalation_types::error::{
    ActivityError, BudgetError, LeagueError, NotificationError, PodError, RbacError,
    RepositoryError, UserError,
};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    User(UserError),
    Rbac(RbacError),
    League(LeagueError),
    Pod(PodError),
    Budget(BudgetError),
    Notification(NotificationError),
    Activity(ActivityError),
    /// Authentication failure.
    Unauthorized(String),
    /// Authenticated, but lacking a permission.
    Forbidden(String),
    /// Validation error.
    Validation(String),
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

macro_rules! from_domain {
    ($($err:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$err> for AppError {
                fn from(e: $err) -> Self {
                    AppError::$variant(e)
                }
            }
        )*
    };
}

from_domain!(
    UserError => User,
    RbacError => Rbac,
    LeagueError => League,
    PodError => Pod,
    BudgetError => Budget,
    NotificationError => Notification,
    ActivityError => Activity,
);

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound("Resource not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl AppError {
    /// HTTP status and machine-readable code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        use StatusCode as S;
        match self {
            AppError::User(e) => match e {
                UserError::NotFound => (S::NOT_FOUND, "USER_NOT_FOUND"),
                UserError::EmailConflict(_) => (S::CONFLICT, "EMAIL_CONFLICT"),
                UserError::UnknownRole(_) => (S::BAD_REQUEST, "UNKNOWN_ROLE"),
                UserError::Inactive => (S::FORBIDDEN, "ACCOUNT_INACTIVE"),
                UserError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                UserError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "USER_ERROR"),
            },
            AppError::Rbac(e) => match e {
                RbacError::RoleNotFound => (S::NOT_FOUND, "ROLE_NOT_FOUND"),
                RbacError::ParentNotFound => (S::NOT_FOUND, "PARENT_ROLE_NOT_FOUND"),
                RbacError::InvalidPermissions(_) => (S::BAD_REQUEST, "INVALID_PERMISSIONS"),
                RbacError::InvalidRoleName(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                RbacError::RoleNameConflict(_) => (S::CONFLICT, "ROLE_NAME_CONFLICT"),
                RbacError::ProtectedRole(_) => (S::FORBIDDEN, "PROTECTED_ROLE"),
                RbacError::SuperAdminMustKeepAll => (S::BAD_REQUEST, "SUPER_ADMIN_PERMISSIONS"),
                RbacError::WouldCreateCycle => (S::BAD_REQUEST, "CIRCULAR_HIERARCHY"),
                RbacError::RoleInUse(_) => (S::CONFLICT, "ROLE_IN_USE"),
                RbacError::RoleHasInheritors(_) => (S::CONFLICT, "ROLE_HAS_INHERITORS"),
                RbacError::Forbidden(_) => (S::FORBIDDEN, "FORBIDDEN"),
                RbacError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "RBAC_ERROR"),
            },
            AppError::League(e) => match e {
                LeagueError::NotFound => (S::NOT_FOUND, "LEAGUE_NOT_FOUND"),
                LeagueError::NoActiveLeague => (S::NOT_FOUND, "NO_ACTIVE_LEAGUE"),
                LeagueError::AlreadyEnrolled => (S::CONFLICT, "ALREADY_ENROLLED"),
                LeagueError::NotEnrolled => (S::NOT_FOUND, "NOT_ENROLLED"),
                LeagueError::LeagueFull => (S::CONFLICT, "LEAGUE_FULL"),
                LeagueError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                LeagueError::Calendar(_) => (S::BAD_REQUEST, "CALENDAR_ERROR"),
                LeagueError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "LEAGUE_ERROR"),
            },
            AppError::Pod(e) => match e {
                PodError::NotFound => (S::NOT_FOUND, "POD_NOT_FOUND"),
                PodError::LeagueNotFound => (S::NOT_FOUND, "LEAGUE_NOT_FOUND"),
                PodError::NotEnrolled => (S::FORBIDDEN, "NOT_ENROLLED"),
                PodError::PodFull => (S::CONFLICT, "POD_FULL"),
                PodError::AlreadyJoined => (S::CONFLICT, "ALREADY_JOINED"),
                PodError::NotParticipant => (S::FORBIDDEN, "NOT_PARTICIPANT"),
                PodError::InvalidState { .. } => (S::CONFLICT, "INVALID_POD_STATE"),
                PodError::AlreadyConfirmed => (S::CONFLICT, "ALREADY_CONFIRMED"),
                PodError::Changed => (S::CONFLICT, "POD_CHANGED"),
                PodError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                PodError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "POD_ERROR"),
            },
            AppError::Budget(e) => match e {
                BudgetError::NotFound => (S::NOT_FOUND, "BUDGET_NOT_FOUND"),
                BudgetError::CardNotFound => (S::NOT_FOUND, "CARD_NOT_FOUND"),
                BudgetError::LeagueNotFound => (S::NOT_FOUND, "LEAGUE_NOT_FOUND"),
                BudgetError::NotEnrolled => (S::FORBIDDEN, "NOT_ENROLLED"),
                BudgetError::AlreadyExists => (S::CONFLICT, "BUDGET_EXISTS"),
                BudgetError::Forbidden => (S::FORBIDDEN, "FORBIDDEN"),
                BudgetError::Locked { .. } => (S::FORBIDDEN, "BUDGET_LOCKED"),
                BudgetError::InsufficientBudget { .. } => (S::BAD_REQUEST, "INSUFFICIENT_BUDGET"),
                BudgetError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                BudgetError::Calendar(_) => (S::BAD_REQUEST, "CALENDAR_ERROR"),
                BudgetError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "BUDGET_ERROR"),
            },
            AppError::Notification(e) => match e {
                NotificationError::NotFound => (S::NOT_FOUND, "NOTIFICATION_NOT_FOUND"),
                NotificationError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                NotificationError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "NOTIFICATION_ERROR"),
            },
            AppError::Activity(e) => match e {
                ActivityError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
                ActivityError::StorageError(_) => (S::INTERNAL_SERVER_ERROR, "ACTIVITY_ERROR"),
            },
            AppError::Unauthorized(_) => (S::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (S::FORBIDDEN, "FORBIDDEN"),
            AppError::Validation(_) => (S::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (S::NOT_FOUND, "NOT_FOUND"),
            AppError::Internal(_) => (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::User(e) => e.to_string(),
            AppError::Rbac(e) => e.to_string(),
            AppError::League(e) => e.to_string(),
            AppError::Pod(e) => e.to_string(),
            AppError::Budget(e) => e.to_string(),
            AppError::Notification(e) => e.to_string(),
            AppError::Activity(e) => e.to_string(),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Structured context for errors that carry it.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Budget(BudgetError::InsufficientBudget { remaining, required }) => {
                Some(json!({ "remaining": remaining, "required": required }))
            }
            AppError::Budget(BudgetError::Locked { current_week }) => {
                Some(json!({ "current_week": current_week }))
            }
            AppError::Rbac(RbacError::Forbidden(missing)) => Some(json!({ "missing": missing })),
            AppError::Rbac(RbacError::InvalidPermissions(ids)) => Some(json!({ "invalid_ids": ids })),
            AppError::Rbac(RbacError::RoleHasInheritors(roles)) => Some(json!({ "inherited_by": roles })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(code, "{message}");
        } else {
            tracing::debug!(code, status = status.as_u16(), "{message}");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [error]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escalation_types::money::Money;

    #[test]
    fn test_domain_errors_map_to_status() {
        let cases = [
            (AppError::from(UserError::NotFound), StatusCode::NOT_FOUND),
            (AppError::from(RbacError::WouldCreateCycle), StatusCode::BAD_REQUEST),
            (AppError::from(RbacError::Forbidden(vec!["pod_read".into()])), StatusCode::FORBIDDEN),
            (AppError::from(LeagueError::AlreadyEnrolled), StatusCode::CONFLICT),
            (AppError::from(PodError::PodFull), StatusCode::CONFLICT),
            (AppError::from(PodError::Changed), StatusCode::CONFLICT),
            (AppError::from(BudgetError::Locked { current_week: 3 }), StatusCode::FORBIDDEN),
            (AppError::from(RepositoryError::NotFound), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("no key".into()), StatusCode::UNAUTHORIZED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{err:?}");
        }
    }

    #[test]
    fn test_insufficient_budget_carries_details() {
        let err = AppError::from(BudgetError::InsufficientBudget {
            remaining: Money::from_cents(250),
            required: Money::from_cents(400),
        });
        let details = err.details().unwrap();
        assert_eq!(details["remaining"], 2.5);
        assert_eq!(details["required"], 4.0);
    }
}
