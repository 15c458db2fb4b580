use thiserror::Error;

use crate::money::Money;
use crate::pod::PodStatus;
use crate::rbac::PermissionId;

/// Errors from repository operations (used by trait definitions in escalation-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to role and permission administration.
#[derive(Debug, Error)]
pub enum RbacError {
    #[error("role not found")]
    RoleNotFound,

    #[error("parent role not found")]
    ParentNotFound,

    #[error("invalid permission ids: {0:?}")]
    InvalidPermissions(Vec<PermissionId>),

    #[error("invalid role name '{0}': use lowercase letters, digits and underscores, starting with a letter")]
    InvalidRoleName(String),

    #[error("role '{0}' already exists")]
    RoleNameConflict(String),

    #[error("'{0}' is a protected system role")]
    ProtectedRole(String),

    #[error("super_admin must retain every permission")]
    SuperAdminMustKeepAll,

    #[error("setting this parent would create a circular hierarchy")]
    WouldCreateCycle,

    #[error("role is assigned to {0} user(s)")]
    RoleInUse(i64),

    #[error("role is inherited by: {}", .0.join(", "))]
    RoleHasInheritors(Vec<String>),

    #[error("missing required permission(s): {}", .0.join(", "))]
    Forbidden(Vec<String>),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to user accounts.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("email '{0}' is already registered")]
    EmailConflict(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("account is inactive")]
    Inactive,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from league week arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("invalid cutoff weekday '{0}'")]
    InvalidWeekday(String),

    #[error("invalid cutoff time '{0}': expected HH:MM")]
    InvalidCutoffTime(String),

    #[error("league end date must not precede its start date")]
    InvalidRange,
}

/// Errors related to leagues and enrollments.
#[derive(Debug, Error)]
pub enum LeagueError {
    #[error("league not found")]
    NotFound,

    #[error("no active league")]
    NoActiveLeague,

    #[error("already enrolled in this league")]
    AlreadyEnrolled,

    #[error("not enrolled in this league")]
    NotEnrolled,

    #[error("league is full")]
    LeagueFull,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to pods and game results.
#[derive(Debug, Error)]
pub enum PodError {
    #[error("pod not found")]
    NotFound,

    #[error("league not found")]
    LeagueNotFound,

    #[error("user is not enrolled in this league")]
    NotEnrolled,

    #[error("pod is full")]
    PodFull,

    #[error("already in this pod")]
    AlreadyJoined,

    #[error("not a participant in this pod")]
    NotParticipant,

    #[error("pod is {actual}, expected {expected}")]
    InvalidState { expected: PodStatus, actual: PodStatus },

    #[error("result already confirmed")]
    AlreadyConfirmed,

    #[error("pod changed while the request was processed; reload and retry")]
    Changed,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to budgets and budget cards.
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget not found")]
    NotFound,

    #[error("card not found")]
    CardNotFound,

    #[error("league not found")]
    LeagueNotFound,

    #[error("not enrolled in this league")]
    NotEnrolled,

    #[error("budget already exists for this league")]
    AlreadyExists,

    #[error("budget belongs to another user")]
    Forbidden,

    #[error("card additions and removals are locked until the weekly window reopens (week {current_week})")]
    Locked { current_week: u32 },

    #[error("insufficient budget: {remaining} remaining, {required} required")]
    InsufficientBudget { remaining: Money, required: Money },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to activity log queries.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_forbidden_lists_permissions() {
        let err = RbacError::Forbidden(vec!["pod_create".into(), "pod_read".into()]);
        assert_eq!(
            err.to_string(),
            "missing required permission(s): pod_create, pod_read"
        );
    }

    #[test]
    fn test_insufficient_budget_display() {
        let err = BudgetError::InsufficientBudget {
            remaining: Money::from_cents(350),
            required: Money::from_cents(1200),
        };
        assert_eq!(
            err.to_string(),
            "insufficient budget: $3.50 remaining, $12.00 required"
        );
    }

    #[test]
    fn test_invalid_state_display() {
        let err = PodError::InvalidState {
            expected: PodStatus::Open,
            actual: PodStatus::Complete,
        };
        assert_eq!(err.to_string(), "pod is complete, expected open");
    }
}
