//! Notification repository trait definition.

use escalation_types::error::RepositoryError;
use escalation_types::notification::{NewNotification, Notification, NotificationId};
use escalation_types::user::UserId;

pub trait NotificationRepository: Send + Sync {
    fn create(
        &self,
        user_id: UserId,
        notification: &NewNotification,
    ) -> impl std::future::Future<Output = Result<Notification, RepositoryError>> + Send;

    /// Insert one copy per recipient. Returns the number inserted.
    fn create_many(
        &self,
        user_ids: &[UserId],
        notification: &NewNotification,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Insert one copy for every active user holding one of `role_names`.
    fn create_for_roles(
        &self,
        role_names: &[&str],
        notification: &NewNotification,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// A user's notifications, newest first.
    fn list(
        &self,
        user_id: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Notification>, RepositoryError>> + Send;

    /// `(total, unread)` for a user.
    fn counts(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<(i64, i64), RepositoryError>> + Send;

    fn get(
        &self,
        id: NotificationId,
    ) -> impl std::future::Future<Output = Result<Option<Notification>, RepositoryError>> + Send;

    fn mark_read(
        &self,
        id: NotificationId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Returns the number of notifications changed.
    fn mark_all_read(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    fn delete(
        &self,
        id: NotificationId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
