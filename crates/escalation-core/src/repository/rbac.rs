//! Role/permission repository trait definition.

use escalation_types::error::RepositoryError;
use escalation_types::rbac::{PermissionId, Role, RoleId};

use crate::rbac::RbacSnapshot;

/// Repository trait for roles, permissions and the role hierarchy.
pub trait RoleRepository: Send + Sync {
    /// Load every role, permission, direct assignment and hierarchy edge.
    ///
    /// Roles are ordered by id and permissions by name.
    fn snapshot(
        &self,
    ) -> impl std::future::Future<Output = Result<RbacSnapshot, RepositoryError>> + Send;

    fn get_role(
        &self,
        id: RoleId,
    ) -> impl std::future::Future<Output = Result<Option<Role>, RepositoryError>> + Send;

    /// Insert a role with its direct permissions and optional parent edge in
    /// one transaction. Returns `Conflict` when the name is taken.
    fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        permission_ids: &[PermissionId],
        inherits_from: Option<RoleId>,
    ) -> impl std::future::Future<Output = Result<Role, RepositoryError>> + Send;

    /// Replace the direct permission set of a role.
    fn replace_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Drop every edge where `role_id` is the inheritor, then add
    /// `role_id -> inherits_from` when given.
    fn set_parent(
        &self,
        role_id: RoleId,
        inherits_from: Option<RoleId>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_role(
        &self,
        role_id: RoleId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Number of users (deleted or not) holding the role.
    fn count_users_with_role(
        &self,
        role_id: RoleId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
