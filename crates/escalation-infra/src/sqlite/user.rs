//! SQLite user repository implementation.

use escalation_core::repository::user::{NewUser, UserRepository};
use escalation_types::error::RepositoryError;
use escalation_types::page::PageRequest;
use escalation_types::rbac::RoleId;
use escalation_types::user::{UpdateProfileRequest, User, UserFilter, UserId};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::pool::DatabasePool;
use super::{is_unique_violation, now, parse_datetime, query_err};

const SELECT_USER: &str = "SELECT u.id, u.email, u.firstname, u.lastname, u.role_id, r.name AS role_name,
        u.is_active, u.is_deleted, u.wins, u.losses, u.draws, u.created_at, u.updated_at
 FROM users u JOIN roles r ON r.id = u.role_id";

/// SQLite-backed implementation of `UserRepository`.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct UserRow {
    id: i64,
    email: String,
    firstname: String,
    lastname: String,
    role_id: i64,
    role_name: String,
    is_active: bool,
    is_deleted: bool,
    wins: i64,
    losses: i64,
    draws: i64,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
            role_id: row.try_get("role_id")?,
            role_name: row.try_get("role_name")?,
            is_active: row.try_get("is_active")?,
            is_deleted: row.try_get("is_deleted")?,
            wins: row.try_get("wins")?,
            losses: row.try_get("losses")?,
            draws: row.try_get("draws")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            id: UserId(self.id),
            email: self.email,
            firstname: self.firstname,
            lastname: self.lastname,
            role_id: RoleId(self.role_id),
            role_name: self.role_name,
            is_active: self.is_active,
            is_deleted: self.is_deleted,
            wins: self.wins,
            losses: self.losses,
            draws: self.draws,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    UserRow::from_row(row).map_err(query_err)?.into_user()
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if !filter.include_deleted {
        qb.push(" AND u.is_deleted = 0");
    }
    if let Some(active) = filter.is_active {
        qb.push(" AND u.is_active = ").push_bind(active);
    }
    if let Some(role_id) = filter.role_id {
        qb.push(" AND u.role_id = ").push_bind(role_id.get());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        qb.push(" AND (LOWER(u.email) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(u.firstname) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(u.lastname) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl SqliteUserRepository {
    async fn fetch(&self, id: UserId, from_writer: bool) -> Result<Option<User>, RepositoryError> {
        let pool = if from_writer {
            &self.pool.writer
        } else {
            &self.pool.reader
        };
        let row = sqlx::query(&format!("{SELECT_USER} WHERE u.id = ?"))
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_user).transpose()
    }

    /// Re-read a user after a write, on the writer connection.
    async fn reload(&self, id: UserId) -> Result<User, RepositoryError> {
        self.fetch(id, true).await?.ok_or(RepositoryError::NotFound)
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO users (email, firstname, lastname, role_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.email)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(user.role_id.get())
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => self.reload(UserId(done.last_insert_rowid())).await,
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "email '{}' already exists",
                user.email
            ))),
            Err(e) => Err(query_err(e)),
        }
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.fetch(id, false).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE u.email = ?"))
            .bind(email)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_user).transpose()
    }

    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<(Vec<User>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users u");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_USER);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY u.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let users = rows.iter().map(map_user).collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    async fn update_profile(&self, id: UserId, update: &UpdateProfileRequest) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET
                email = COALESCE(?, email),
                firstname = COALESCE(?, firstname),
                lastname = COALESCE(?, lastname),
                updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(update.email.as_deref())
        .bind(update.firstname.as_deref())
        .bind(update.lastname.as_deref())
        .bind(now())
        .bind(id.get())
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => self.reload(id).await,
            Err(e) if is_unique_violation(&e) => {
                Err(RepositoryError::Conflict("email already exists".to_string()))
            }
            Err(e) => Err(query_err(e)),
        }
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<User, RepositoryError> {
        let done = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now())
            .bind(id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.reload(id).await
    }

    async fn set_role(&self, id: UserId, role_id: RoleId) -> Result<User, RepositoryError> {
        let role: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE id = ?")
            .bind(role_id.get())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if role.is_none() {
            return Err(RepositoryError::Conflict(format!("unknown role {role_id}")));
        }

        let done = sqlx::query("UPDATE users SET role_id = ?, updated_at = ? WHERE id = ?")
            .bind(role_id.get())
            .bind(now())
            .bind(id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.reload(id).await
    }

    async fn soft_delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let done = sqlx::query(
            "UPDATE users SET is_deleted = 1, is_active = 0, updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(now())
        .bind(id.get())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_role_id(&self, role_name: &str) -> Result<Option<RoleId>, RepositoryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE name = ?")
            .bind(role_name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.map(|(id,)| RoleId(id)))
    }
}
