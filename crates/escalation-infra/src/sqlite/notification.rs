//! SQLite notification repository implementation.

use escalation_core::repository::notification::NotificationRepository;
use escalation_types::error::RepositoryError;
use escalation_types::notification::{NewNotification, Notification, NotificationId};
use escalation_types::user::UserId;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::pool::DatabasePool;
use super::{now, parse_datetime, query_err};

const SELECT_NOTIFICATION: &str =
    "SELECT id, user_id, title, message, kind, link, is_read, created_at FROM notifications";

/// SQLite-backed implementation of `NotificationRepository`.
#[derive(Clone)]
pub struct SqliteNotificationRepository {
    pool: DatabasePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct NotificationRow {
    id: i64,
    user_id: i64,
    title: String,
    message: Option<String>,
    kind: String,
    link: Option<String>,
    is_read: bool,
    created_at: String,
}

impl NotificationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: row.try_get("kind")?,
            link: row.try_get("link")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_notification(self) -> Result<Notification, RepositoryError> {
        Ok(Notification {
            id: NotificationId(self.id),
            user_id: UserId(self.user_id),
            title: self.title,
            message: self.message,
            kind: self.kind.parse().map_err(RepositoryError::Query)?,
            link: self.link,
            is_read: self.is_read,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    NotificationRow::from_row(row).map_err(query_err)?.into_notification()
}

impl NotificationRepository for SqliteNotificationRepository {
    async fn create(&self, user_id: UserId, notification: &NewNotification) -> Result<Notification, RepositoryError> {
        let done = sqlx::query(
            "INSERT INTO notifications (user_id, title, message, kind, link, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id.get())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.to_string())
        .bind(&notification.link)
        .bind(now())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        let row = sqlx::query(&format!("{SELECT_NOTIFICATION} WHERE id = ?"))
            .bind(done.last_insert_rowid())
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_err)?;
        map_notification(&row)
    }

    async fn create_many(&self, user_ids: &[UserId], notification: &NewNotification) -> Result<u64, RepositoryError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let ts = now();
        let kind = notification.kind.to_string();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO notifications (user_id, title, message, kind, link, created_at) ",
        );
        qb.push_values(user_ids, |mut b, user_id| {
            b.push_bind(user_id.get())
                .push_bind(&notification.title)
                .push_bind(&notification.message)
                .push_bind(&kind)
                .push_bind(&notification.link)
                .push_bind(&ts);
        });

        let done = qb
            .build()
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(done.rows_affected())
    }

    async fn create_for_roles(&self, role_names: &[&str], notification: &NewNotification) -> Result<u64, RepositoryError> {
        if role_names.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO notifications (user_id, title, message, kind, link, created_at) SELECT u.id, ",
        );
        qb.push_bind(&notification.title)
            .push(", ")
            .push_bind(&notification.message)
            .push(", ")
            .push_bind(notification.kind.to_string())
            .push(", ")
            .push_bind(&notification.link)
            .push(", ")
            .push_bind(now())
            .push(
                " FROM users u JOIN roles r ON r.id = u.role_id
                  WHERE u.is_active = 1 AND u.is_deleted = 0 AND r.name IN (",
            );
        let mut names = qb.separated(", ");
        for name in role_names {
            names.push_bind(*name);
        }
        qb.push(")");

        let done = qb
            .build()
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(done.rows_affected())
    }

    async fn list(
        &self,
        user_id: UserId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_NOTIFICATION);
        qb.push(" WHERE user_id = ").push_bind(user_id.get());
        if unread_only {
            qb.push(" AND is_read = 0");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_notification).collect()
    }

    async fn counts(&self, user_id: UserId) -> Result<(i64, i64), RepositoryError> {
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END), 0)
             FROM notifications WHERE user_id = ?",
        )
        .bind(user_id.get())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_err)
    }

    async fn get(&self, id: NotificationId) -> Result<Option<Notification>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_NOTIFICATION} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_notification).transpose()
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let done = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(done.rows_affected())
    }

    async fn delete(&self, id: NotificationId) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::testing::test_pool;
    use crate::sqlite::user::SqliteUserRepository;
    use crate::sqlite::user::tests::insert_user;
    use escalation_core::repository::user::UserRepository;
    use escalation_types::notification::NotificationKind;
    use escalation_types::rbac::{LEAGUE_ADMIN, SUPER_ADMIN};

    fn hello() -> NewNotification {
        NewNotification::new(NotificationKind::Success, "Hello").with_message("Welcome aboard")
    }

    #[tokio::test]
    async fn test_create_list_and_counts() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteNotificationRepository::new(pool);
        let ada = insert_user(&users, "ada@example.com", "league_user").await;

        let first = repo.create(ada.id, &hello()).await.unwrap();
        assert_eq!(first.kind, NotificationKind::Success);
        assert!(!first.is_read);
        repo.create(ada.id, &NewNotification::new(NotificationKind::Info, "Second"))
            .await
            .unwrap();

        repo.mark_read(first.id).await.unwrap();
        assert_eq!(repo.counts(ada.id).await.unwrap(), (2, 1));

        let unread = repo.list(ada.id, true, 20, 0).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "Second");

        let paged = repo.list(ada.id, false, 1, 1).await.unwrap();
        assert_eq!(paged.len(), 1);

        assert_eq!(repo.mark_all_read(ada.id).await.unwrap(), 1);
        assert_eq!(repo.counts(ada.id).await.unwrap(), (2, 0));

        repo.delete(first.id).await.unwrap();
        assert!(repo.get(first.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(first.id).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_create_many_inserts_one_per_recipient() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteNotificationRepository::new(pool);
        let a = insert_user(&users, "a@example.com", "league_user").await;
        let b = insert_user(&users, "b@example.com", "league_user").await;

        assert_eq!(repo.create_many(&[a.id, b.id], &hello()).await.unwrap(), 2);
        assert_eq!(repo.create_many(&[], &hello()).await.unwrap(), 0);
        assert_eq!(repo.counts(b.id).await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn test_create_for_roles_skips_inactive_users() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteNotificationRepository::new(pool);
        let boss = insert_user(&users, "boss@example.com", SUPER_ADMIN).await;
        let organiser = insert_user(&users, "org@example.com", LEAGUE_ADMIN).await;
        let retired = insert_user(&users, "old@example.com", LEAGUE_ADMIN).await;
        let player = insert_user(&users, "p@example.com", "league_user").await;
        users.set_active(retired.id, false).await.unwrap();

        let sent = repo
            .create_for_roles(&[SUPER_ADMIN, LEAGUE_ADMIN], &hello())
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(repo.counts(boss.id).await.unwrap().0, 1);
        assert_eq!(repo.counts(organiser.id).await.unwrap().0, 1);
        assert_eq!(repo.counts(retired.id).await.unwrap().0, 0);
        assert_eq!(repo.counts(player.id).await.unwrap().0, 0);
    }
}
