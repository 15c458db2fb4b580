use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::league::Enrollment;
use crate::rbac::RoleId;

int_id!(
    /// Row id of a user account.
    UserId
);

/// A league member account.
///
/// Deleted accounts are kept (`is_deleted`) so game history stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role_id: RoleId,
    pub role_name: String,
    pub is_active: bool,
    pub is_deleted: bool,
    /// Lifetime record across all leagues.
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    /// Active and not deleted.
    pub fn can_sign_in(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// Request body for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    /// Role name; defaults to `league_user`.
    pub role: Option<String>,
}

/// Request body for updating the caller's profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.firstname.is_none() && self.lastname.is_none()
    }
}

/// A user together with their league enrollments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub leagues: Vec<Enrollment>,
}

/// Filter criteria for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub is_active: Option<bool>,
    pub role_id: Option<RoleId>,
    /// Substring match on email, first name or last name.
    pub search: Option<String>,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub role_id: RoleId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_profile_is_empty() {
        assert!(UpdateProfileRequest::default().is_empty());
        let req = UpdateProfileRequest {
            firstname: Some("Ada".into()),
            ..Default::default()
        };
        assert!(!req.is_empty());
    }
}
