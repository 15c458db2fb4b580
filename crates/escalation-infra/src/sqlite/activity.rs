//! SQLite activity log repository implementation.

use escalation_core::repository::activity::ActivityLogRepository;
use escalation_types::activity::{ActivityFilter, ActivityLog, ActivityLogId, NewActivity};
use escalation_types::error::RepositoryError;
use escalation_types::page::PageRequest;
use escalation_types::user::UserId;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::pool::DatabasePool;
use super::{format_datetime, now, parse_datetime, query_err};

const SELECT_ACTIVITY: &str = "SELECT a.id, a.user_id, a.action, a.metadata, a.timestamp,
        u.email, u.firstname, u.lastname
 FROM activity_logs a
 LEFT JOIN users u ON u.id = a.user_id";

/// SQLite-backed implementation of `ActivityLogRepository`.
#[derive(Clone)]
pub struct SqliteActivityRepository {
    pool: DatabasePool,
}

impl SqliteActivityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ActivityRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    metadata: Option<String>,
    timestamp: String,
    email: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
}

impl ActivityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            action: row.try_get("action")?,
            metadata: row.try_get("metadata")?,
            timestamp: row.try_get("timestamp")?,
            email: row.try_get("email")?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
        })
    }

    fn into_activity(self) -> Result<ActivityLog, RepositoryError> {
        // Older rows may hold free text; keep it rather than failing the page.
        let metadata = self.metadata.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        });
        Ok(ActivityLog {
            id: ActivityLogId(self.id),
            user_id: self.user_id.map(UserId),
            action: self.action,
            metadata,
            timestamp: parse_datetime(&self.timestamp)?,
            email: self.email,
            firstname: self.firstname,
            lastname: self.lastname,
        })
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ActivityFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(action) = filter.action.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        qb.push(" AND LOWER(a.action) LIKE ")
            .push_bind(format!("%{}%", action.to_lowercase()));
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND a.user_id = ").push_bind(user_id.get());
    }
    if let Some(start) = filter.start {
        qb.push(" AND a.timestamp >= ").push_bind(format_datetime(&start));
    }
    if let Some(end) = filter.end {
        qb.push(" AND a.timestamp <= ").push_bind(format_datetime(&end));
    }
}

impl ActivityLogRepository for SqliteActivityRepository {
    async fn insert(&self, entry: &NewActivity) -> Result<(), RepositoryError> {
        let metadata = entry
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("failed to encode metadata: {e}")))?;

        sqlx::query("INSERT INTO activity_logs (user_id, action, metadata, timestamp) VALUES (?, ?, ?, ?)")
            .bind(entry.user_id.map(|id| id.get()))
            .bind(&entry.action)
            .bind(metadata)
            .bind(now())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn list(&self, filter: &ActivityFilter, page: PageRequest) -> Result<(Vec<ActivityLog>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM activity_logs a");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_ACTIVITY);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY a.timestamp DESC, a.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let entries = rows
            .iter()
            .map(|row| ActivityRow::from_row(row).map_err(query_err)?.into_activity())
            .collect::<Result<Vec<_>, _>>()?;
        Ok((entries, total))
    }

    async fn action_types(&self) -> Result<Vec<String>, RepositoryError> {
        sqlx::query_scalar("SELECT DISTINCT action FROM activity_logs ORDER BY action")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)
    }
}
