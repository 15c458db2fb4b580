//! User repository trait definition.

use escalation_types::error::RepositoryError;
use escalation_types::page::PageRequest;
use escalation_types::rbac::RoleId;
use escalation_types::user::{UpdateProfileRequest, User, UserFilter, UserId};

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub role_id: RoleId,
}

/// Repository trait for user accounts.
///
/// Implementations live in escalation-infra (e.g., SqliteUserRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait UserRepository: Send + Sync {
    /// Insert a user. Returns `Conflict` when the email is taken.
    fn create(
        &self,
        user: &NewUser,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn get_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// List users matching `filter`, plus the total match count.
    fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<(Vec<User>, i64), RepositoryError>> + Send;

    /// Apply the present fields of `update`. Returns the updated user.
    fn update_profile(
        &self,
        id: UserId,
        update: &UpdateProfileRequest,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn set_active(
        &self,
        id: UserId,
        active: bool,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    fn set_role(
        &self,
        id: UserId,
        role_id: RoleId,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    /// Mark the account deleted and inactive; rows are kept for game history.
    fn soft_delete(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Resolve a role name to its id.
    fn find_role_id(
        &self,
        role_name: &str,
    ) -> impl std::future::Future<Output = Result<Option<RoleId>, RepositoryError>> + Send;
}
