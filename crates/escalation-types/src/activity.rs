//! Audit trail of user and admin actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

int_id!(
    /// Row id of an activity log entry.
    ActivityLogId
);

pub const MAX_ADMIN_LIMIT: i64 = 100;
pub const DEFAULT_ADMIN_LIMIT: i64 = 50;
pub const MAX_OWN_LIMIT: i64 = 50;
pub const DEFAULT_OWN_LIMIT: i64 = 20;

/// Action names recorded in the activity log.
pub mod actions {
    pub const PROFILE_UPDATED: &str = "Profile updated";
    pub const ACCOUNT_DELETED: &str = "Account deleted";
    pub const USER_CREATED: &str = "User created";
    pub const ROLE_CHANGED: &str = "Changed user role";
    pub const USER_ACTIVATED: &str = "Activated user";
    pub const USER_DEACTIVATED: &str = "Deactivated user";
    pub const LEAGUE_CREATED: &str = "League created";
    pub const LEAGUE_UPDATED: &str = "League updated";
    pub const LEAGUE_ACTIVATED: &str = "League set active";
    pub const LEAGUE_SIGNUP: &str = "League signup requested";
    pub const LEAGUE_LEFT: &str = "Left league";
    pub const GAME_CREATED: &str = "Game created";
    pub const GAME_JOINED: &str = "Joined game";
    pub const RESULT_DECLARED: &str = "Declared game result";
    pub const RESULT_CONFIRMED: &str = "Confirmed game result";
    pub const GAME_COMPLETED: &str = "Game completed";
    pub const POD_UPDATED: &str = "Updated pod";
    pub const POD_DELETED: &str = "Deleted pod";
    pub const BUDGET_CREATED: &str = "Budget created";
    pub const BUDGET_ADJUSTED: &str = "Budget adjusted";
    pub const CARD_ADDED: &str = "Card added to budget";
    pub const CARD_UPDATED: &str = "Budget card updated";
    pub const CARD_REMOVED: &str = "Card removed from budget";
    pub const ROLE_CREATED: &str = "role_created";
    pub const ROLE_DELETED: &str = "role_deleted";
    pub const ROLE_PERMISSIONS_UPDATED: &str = "role_permissions_updated";
    pub const ROLE_HIERARCHY_UPDATED: &str = "role_hierarchy_updated";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: ActivityLogId,
    pub user_id: Option<UserId>,
    pub action: String,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

/// An entry to append to the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub user_id: Option<UserId>,
    pub action: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(user_id: UserId, action: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            action: action.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filter criteria for listing activity.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Case-insensitive substring match on the action.
    pub action: Option<String>,
    pub user_id: Option<UserId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_activity_builder() {
        let entry = NewActivity::new(UserId(7), actions::GAME_JOINED)
            .with_metadata(serde_json::json!({ "pod_id": 3 }));
        assert_eq!(entry.user_id, Some(UserId(7)));
        assert_eq!(entry.action, "Joined game");
        assert_eq!(entry.metadata.unwrap()["pod_id"], 3);
    }
}
