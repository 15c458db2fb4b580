//! In-app notification service.

use escalation_types::error::{NotificationError, RepositoryError};
use escalation_types::notification::{
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, NewNotification, Notification, NotificationId,
    NotificationList,
};
use escalation_types::rbac::{LEAGUE_ADMIN, SUPER_ADMIN};
use escalation_types::user::UserId;

use crate::repository::notification::NotificationRepository;

/// Roles that receive admin notifications.
pub const ADMIN_ROLES: &[&str] = &[SUPER_ADMIN, LEAGUE_ADMIN];

pub struct NotificationService<N: NotificationRepository> {
    repo: N,
}

fn storage(e: RepositoryError) -> NotificationError {
    NotificationError::StorageError(e.to_string())
}

fn validate(notification: &NewNotification) -> Result<(), NotificationError> {
    if notification.title.trim().is_empty() {
        return Err(NotificationError::Validation(
            "title is required".to_string(),
        ));
    }
    Ok(())
}

impl<N: NotificationRepository> NotificationService<N> {
    pub fn new(repo: N) -> Self {
        Self { repo }
    }

    #[cfg(test)]
    pub(crate) fn repo(&self) -> &N {
        &self.repo
    }

    pub async fn send(
        &self,
        user_id: UserId,
        notification: &NewNotification,
    ) -> Result<Notification, NotificationError> {
        validate(notification)?;
        self.repo.create(user_id, notification).await.map_err(storage)
    }

    pub async fn send_bulk(
        &self,
        user_ids: &[UserId],
        notification: &NewNotification,
    ) -> Result<u64, NotificationError> {
        validate(notification)?;
        if user_ids.is_empty() {
            return Err(NotificationError::Validation(
                "at least one recipient is required".to_string(),
            ));
        }
        let mut recipients = user_ids.to_vec();
        recipients.sort();
        recipients.dedup();
        self.repo
            .create_many(&recipients, notification)
            .await
            .map_err(storage)
    }

    /// Notify every active super_admin and league_admin.
    pub async fn notify_admins(&self, notification: &NewNotification) -> Result<u64, NotificationError> {
        validate(notification)?;
        self.repo
            .create_for_roles(ADMIN_ROLES, notification)
            .await
            .map_err(storage)
    }

    /// Best-effort delivery used by league workflows; failures are traced.
    pub async fn notify(&self, user_id: UserId, notification: &NewNotification) {
        if let Err(e) = self.repo.create(user_id, notification).await {
            tracing::warn!(user_id = %user_id, title = %notification.title, error = %e, "failed to send notification");
        }
    }

    pub async fn notify_many(&self, user_ids: &[UserId], notification: &NewNotification) {
        if user_ids.is_empty() {
            return;
        }
        if let Err(e) = self.repo.create_many(user_ids, notification).await {
            tracing::warn!(recipients = user_ids.len(), title = %notification.title, error = %e, "failed to send notifications");
        }
    }

    pub async fn notify_admins_quietly(&self, notification: &NewNotification) {
        if let Err(e) = self.repo.create_for_roles(ADMIN_ROLES, notification).await {
            tracing::warn!(title = %notification.title, error = %e, "failed to notify admins");
        }
    }

    /// The caller's notifications, newest first, with counts.
    pub async fn list(
        &self,
        user_id: UserId,
        unread_only: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<NotificationList, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        let notifications = self
            .repo
            .list(user_id, unread_only, limit, offset)
            .await
            .map_err(storage)?;
        let (total, unread) = self.repo.counts(user_id).await.map_err(storage)?;
        Ok(NotificationList {
            notifications,
            total,
            unread,
        })
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, NotificationError> {
        let (_, unread) = self.repo.counts(user_id).await.map_err(storage)?;
        Ok(unread)
    }

    /// Someone else's notification looks exactly like a missing one.
    async fn owned(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationError> {
        self.repo
            .get(id)
            .await
            .map_err(storage)?
            .filter(|n| n.user_id == user_id)
            .ok_or(NotificationError::NotFound)
    }

    /// Mark one notification read. Marking an already-read one is a no-op.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationError> {
        let mut notification = self.owned(user_id, id).await?;
        if !notification.is_read {
            self.repo.mark_read(id).await.map_err(storage)?;
            notification.is_read = true;
        }
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, NotificationError> {
        self.repo.mark_all_read(user_id).await.map_err(storage)
    }

    pub async fn delete(&self, user_id: UserId, id: NotificationId) -> Result<(), NotificationError> {
        self.owned(user_id, id).await?;
        self.repo.delete(id).await.map_err(storage)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use escalation_types::notification::NotificationKind;

    use super::*;

    /// Keeps notifications in memory; `admins` stand in for role holders.
    #[derive(Default)]
    pub(crate) struct MemoryNotificationRepo {
        pub rows: Mutex<Vec<Notification>>,
        pub admins: Vec<UserId>,
        pub mark_read_calls: Mutex<usize>,
    }

    impl MemoryNotificationRepo {
        pub fn titles_for(&self, user_id: UserId) -> Vec<String> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.user_id == user_id)
                .map(|n| n.title.clone())
                .collect()
        }
    }

    impl NotificationRepository for MemoryNotificationRepo {
        async fn create(
            &self,
            user_id: UserId,
            notification: &NewNotification,
        ) -> Result<Notification, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let row = Notification {
                id: NotificationId(rows.len() as i64 + 1),
                user_id,
                title: notification.title.clone(),
                message: notification.message.clone(),
                kind: notification.kind,
                link: notification.link.clone(),
                is_read: false,
                created_at: Utc::now(),
            };
            rows.push(row.clone());
            Ok(row)
        }

        async fn create_many(
            &self,
            user_ids: &[UserId],
            notification: &NewNotification,
        ) -> Result<u64, RepositoryError> {
            for user_id in user_ids {
                self.create(*user_id, notification).await?;
            }
            Ok(user_ids.len() as u64)
        }

        async fn create_for_roles(
            &self,
            _role_names: &[&str],
            notification: &NewNotification,
        ) -> Result<u64, RepositoryError> {
            self.create_many(&self.admins, notification).await
        }

        async fn list(
            &self,
            user_id: UserId,
            unread_only: bool,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Notification>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn counts(&self, user_id: UserId) -> Result<(i64, i64), RepositoryError> {
            let rows = self.rows.lock().unwrap();
            let mine: Vec<&Notification> = rows.iter().filter(|n| n.user_id == user_id).collect();
            let unread = mine.iter().filter(|n| !n.is_read).count();
            Ok((mine.len() as i64, unread as i64))
        }

        async fn get(&self, id: NotificationId) -> Result<Option<Notification>, RepositoryError> {
            Ok(self.rows.lock().unwrap().iter().find(|n| n.id == id).cloned())
        }

        async fn mark_read(&self, id: NotificationId) -> Result<(), RepositoryError> {
            *self.mark_read_calls.lock().unwrap() += 1;
            let mut rows = self.rows.lock().unwrap();
            let row = rows.iter_mut().find(|n| n.id == id).ok_or(RepositoryError::NotFound)?;
            row.is_read = true;
            Ok(())
        }

        async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
            let mut changed = 0;
            for row in self.rows.lock().unwrap().iter_mut() {
                if row.user_id == user_id && !row.is_read {
                    row.is_read = true;
                    changed += 1;
                }
            }
            Ok(changed)
        }

        async fn delete(&self, id: NotificationId) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().retain(|n| n.id != id);
            Ok(())
        }
    }

    fn note(title: &str) -> NewNotification {
        NewNotification::new(NotificationKind::Info, title)
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let service = NotificationService::new(MemoryNotificationRepo::default());
        let sent = service.send(UserId(1), &note("Pod assigned")).await.unwrap();

        let first = service.mark_read(UserId(1), sent.id).await.unwrap();
        assert!(first.is_read);
        let second = service.mark_read(UserId(1), sent.id).await.unwrap();
        assert!(second.is_read);

        assert_eq!(*service.repo.mark_read_calls.lock().unwrap(), 1);
        assert_eq!(service.unread_count(UserId(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_foreign_notification_is_not_found() {
        let service = NotificationService::new(MemoryNotificationRepo::default());
        let sent = service.send(UserId(1), &note("Pod assigned")).await.unwrap();

        assert!(matches!(
            service.mark_read(UserId(2), sent.id).await,
            Err(NotificationError::NotFound)
        ));
        assert!(matches!(
            service.delete(UserId(2), sent.id).await,
            Err(NotificationError::NotFound)
        ));
        assert_eq!(service.unread_count(UserId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_bulk_dedups_and_validates() {
        let service = NotificationService::new(MemoryNotificationRepo::default());
        let sent = service
            .send_bulk(&[UserId(2), UserId(1), UserId(2)], &note("League starts"))
            .await
            .unwrap();
        assert_eq!(sent, 2);

        assert!(matches!(
            service.send_bulk(&[], &note("League starts")).await,
            Err(NotificationError::Validation(_))
        ));
        assert!(matches!(
            service.send(UserId(1), &note("   ")).await,
            Err(NotificationError::Validation(_))
        ));
    }
}
