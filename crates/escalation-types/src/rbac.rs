//! Roles, permissions and the role hierarchy.
//!
//! A hierarchy edge `(parent_role_id, child_role_id)` means the parent role
//! inherits every permission of the child role. Inheritance is transitive:
//! `super_admin -> league_admin -> pod_admin -> league_user -> user`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

int_id!(
    /// Row id of a role.
    RoleId
);

int_id!(
    /// Row id of a permission.
    PermissionId
);

pub const SUPER_ADMIN: &str = "super_admin";
pub const LEAGUE_ADMIN: &str = "league_admin";
pub const USER: &str = "user";
pub const LEAGUE_USER: &str = "league_user";

/// Roles that can never be deleted.
pub const UNDELETABLE_ROLES: &[&str] = &[SUPER_ADMIN, USER, LEAGUE_USER];

/// Roles whose place in the hierarchy cannot be changed.
pub const FIXED_HIERARCHY_ROLES: &[&str] = &[SUPER_ADMIN, USER];

/// Role assigned to new accounts when none is given.
pub const DEFAULT_USER_ROLE: &str = LEAGUE_USER;

/// Names of the seeded permissions checked by the API.
pub mod permissions {
    pub const AUTH_VIEW_PROFILE: &str = "auth_view_profile";
    pub const AUTH_UPDATE_PROFILE: &str = "auth_update_profile";
    pub const AUTH_DELETE_ACCOUNT: &str = "auth_delete_account";
    pub const LEAGUE_READ: &str = "league_read";
    pub const LEAGUE_VIEW_ACTIVE: &str = "league_view_active";
    pub const LEAGUE_VIEW_DETAILS: &str = "league_view_details";
    pub const LEAGUE_SIGNUP: &str = "league_signup";
    pub const LEAGUE_LEAVE: &str = "league_leave";
    pub const LEAGUE_CREATE: &str = "league_create";
    pub const LEAGUE_UPDATE: &str = "league_update";
    pub const LEAGUE_SET_ACTIVE: &str = "league_set_active";
    pub const POD_READ: &str = "pod_read";
    pub const POD_CREATE: &str = "pod_create";
    pub const POD_UPDATE: &str = "pod_update";
    pub const POD_DELETE: &str = "pod_delete";
    pub const POD_MANAGE: &str = "pod_manage";
    pub const BUDGET_READ: &str = "budget_read";
    pub const BUDGET_MANAGE: &str = "budget_manage";
    pub const BUDGET_MANAGE_LEAGUE: &str = "budget_manage_league";
    pub const ACTIVITY_LOGS_READ_OWN: &str = "activity_logs_read_own";
    pub const ACTIVITY_LOGS_READ_ALL: &str = "activity_logs_read_all";
    pub const ADMIN_USER_READ: &str = "admin_user_read";
    pub const ADMIN_USER_UPDATE: &str = "admin_user_update";
    pub const ADMIN_USER_CREATE: &str = "admin_user_create";
    pub const NOTIFICATION_SEND: &str = "notification_send";
    pub const ROLE_READ: &str = "role_read";
    pub const ROLE_MANAGE: &str = "role_manage";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
}

/// One inheritance edge: `parent_role_id` inherits from `child_role_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub parent_role_id: RoleId,
    pub child_role_id: RoleId,
}

/// Direct assignment of a permission to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

/// A permission a role holds only through inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedPermission {
    #[serde(flatten)]
    pub permission: Permission,
    pub source_role_id: RoleId,
    pub source_role_name: String,
}

/// Direct and inherited permissions of a single role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionsView {
    pub role: Role,
    pub direct: Vec<Permission>,
    pub inherited: Vec<InheritedPermission>,
    pub inherited_roles: Vec<Role>,
}

/// How a role came to hold a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionGrant {
    Direct,
    Inherited {
        source_role_id: RoleId,
        source_role_name: String,
    },
}

/// One cell of the permission matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub has_permission: bool,
    pub is_direct: bool,
    pub source_role_id: Option<RoleId>,
    pub source_role_name: Option<String>,
}

impl MatrixCell {
    pub fn none() -> Self {
        Self {
            has_permission: false,
            is_direct: false,
            source_role_id: None,
            source_role_name: None,
        }
    }
}

impl From<&PermissionGrant> for MatrixCell {
    fn from(grant: &PermissionGrant) -> Self {
        match grant {
            PermissionGrant::Direct => Self {
                has_permission: true,
                is_direct: true,
                source_role_id: None,
                source_role_name: None,
            },
            PermissionGrant::Inherited {
                source_role_id,
                source_role_name,
            } => Self {
                has_permission: true,
                is_direct: false,
                source_role_id: Some(*source_role_id),
                source_role_name: Some(source_role_name.clone()),
            },
        }
    }
}

/// One row (role) of the permission matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRow {
    pub role: Role,
    pub permissions: BTreeMap<PermissionId, MatrixCell>,
    pub inherited_roles: Vec<RoleId>,
}

/// The computed role x permission table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionMatrix {
    pub permissions: Vec<Permission>,
    pub roles: Vec<MatrixRow>,
}

/// A role together with its immediate hierarchy neighbours.
///
/// `parents` are roles that inherit from this one; `children` are roles this
/// one inherits from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub parents: Vec<RoleId>,
    pub children: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTreeNode {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub children: Vec<RoleTreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleHierarchyView {
    pub roles: Vec<RoleSummary>,
    pub tree: Vec<RoleTreeNode>,
    pub edges: Vec<HierarchyEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
    /// Role the new role inherits from.
    pub parent_role_id: Option<RoleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRolePermissionsRequest {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleHierarchyRequest {
    /// Role to inherit from; `null` detaches the role.
    pub parent_role_id: Option<RoleId>,
}

/// Result of replacing a role's direct permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionsChange {
    pub role_id: RoleId,
    pub added: Vec<PermissionId>,
    pub removed: Vec<PermissionId>,
}

/// Check a role name against `^[a-z][a-z0-9_]*$`.
pub fn is_valid_role_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_validation() {
        assert!(is_valid_role_name("judge"));
        assert!(is_valid_role_name("pod_admin_2"));
        assert!(!is_valid_role_name(""));
        assert!(!is_valid_role_name("2fast"));
        assert!(!is_valid_role_name("_hidden"));
        assert!(!is_valid_role_name("Judge"));
        assert!(!is_valid_role_name("head-judge"));
    }

    #[test]
    fn test_matrix_cell_from_grant() {
        let direct = MatrixCell::from(&PermissionGrant::Direct);
        assert!(direct.has_permission && direct.is_direct);
        assert_eq!(direct.source_role_id, None);

        let inherited = MatrixCell::from(&PermissionGrant::Inherited {
            source_role_id: RoleId(5),
            source_role_name: "user".into(),
        });
        assert!(inherited.has_permission);
        assert!(!inherited.is_direct);
        assert_eq!(inherited.source_role_name.as_deref(), Some("user"));
    }

    #[test]
    fn test_matrix_row_serializes_permission_keys_as_strings() {
        let mut permissions = BTreeMap::new();
        permissions.insert(PermissionId(3), MatrixCell::none());
        let row = MatrixRow {
            role: Role {
                id: RoleId(1),
                name: "user".into(),
                description: None,
            },
            permissions,
            inherited_roles: vec![],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["permissions"]["3"]["has_permission"], false);
    }

    #[test]
    fn test_id_parse_and_display() {
        let id: RoleId = " 42 ".parse().unwrap();
        assert_eq!(id, RoleId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<RoleId>().is_err());
    }
}
