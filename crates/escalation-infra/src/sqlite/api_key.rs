//! API key storage.
//!
//! Only the SHA-256 hash of a key is stored; the plaintext is shown once,
//! when the key is created. Each key authenticates as one user.

use chrono::{DateTime, Utc};
use escalation_types::error::RepositoryError;
use escalation_types::user::UserId;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{now, parse_datetime, query_err};

/// Prefix of every generated key.
pub const KEY_PREFIX: &str = "escl_";

/// Stored metadata of an API key (never the key itself).
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub name: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a fresh plaintext key: the prefix plus 64 hex characters.
pub fn generate_api_key() -> String {
    let mut key = String::from(KEY_PREFIX);
    for _ in 0..2 {
        for byte in uuid::Uuid::new_v4().as_bytes() {
            key.push_str(&format!("{byte:02x}"));
        }
    }
    key
}

#[derive(Clone)]
pub struct SqliteApiKeyRepository {
    pool: DatabasePool,
}

impl SqliteApiKeyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a key for `user_id`. Returns the record and the plaintext key.
    pub async fn create(&self, user_id: UserId, name: &str) -> Result<(ApiKeyRecord, String), RepositoryError> {
        let plaintext = generate_api_key();
        let id = uuid::Uuid::now_v7().to_string();
        let created_at = now();

        sqlx::query("INSERT INTO api_keys (id, key_hash, name, user_id, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(hash_api_key(&plaintext))
            .bind(name)
            .bind(user_id.get())
            .bind(&created_at)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        let record = ApiKeyRecord {
            id,
            name: name.to_string(),
            user_id,
            created_at: parse_datetime(&created_at)?,
            last_used_at: None,
        };
        Ok((record, plaintext))
    }

    /// Resolve a plaintext key to its user, recording the use.
    pub async fn resolve(&self, plaintext: &str) -> Result<Option<UserId>, RepositoryError> {
        let row: Option<(String, i64)> = sqlx::query_as("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(hash_api_key(plaintext))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let Some((id, user_id)) = row else {
            return Ok(None);
        };

        // Best effort; a failed touch must not fail the request.
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(now())
            .bind(&id)
            .execute(&self.pool.writer)
            .await
        {
            tracing::debug!(key_id = %id, "failed to record api key use: {e}");
        }
        Ok(Some(UserId(user_id)))
    }

    pub async fn any_exists(&self) -> Result<bool, RepositoryError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM api_keys LIMIT 1")
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.is_some())
    }

    /// Keys owned by a user, oldest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ApiKeyRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, user_id, created_at, last_used_at FROM api_keys
             WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id.get())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        rows.iter()
            .map(|row| {
                let created_at: String = row.try_get("created_at").map_err(query_err)?;
                let last_used_at: Option<String> = row.try_get("last_used_at").map_err(query_err)?;
                Ok(ApiKeyRecord {
                    id: row.try_get("id").map_err(query_err)?,
                    name: row.try_get("name").map_err(query_err)?,
                    user_id: UserId(row.try_get("user_id").map_err(query_err)?),
                    created_at: parse_datetime(&created_at)?,
                    last_used_at: last_used_at.as_deref().map(parse_datetime).transpose()?,
                })
            })
            .collect()
    }

    pub async fn revoke(&self, id: &str) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM api_keys WHERE id = ?")
            .bind(id)
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

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_api_key("escl_test");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key("escl_test"));
        assert_ne!(hash, hash_api_key("escl_other"));
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_resolve_and_revoke() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteApiKeyRepository::new(pool);
        let ada = insert_user(&users, "ada@example.com", "super_admin").await;

        assert!(!repo.any_exists().await.unwrap());
        let (record, plaintext) = repo.create(ada.id, "laptop").await.unwrap();
        assert!(repo.any_exists().await.unwrap());

        assert_eq!(repo.resolve(&plaintext).await.unwrap(), Some(ada.id));
        assert_eq!(repo.resolve("escl_bogus").await.unwrap(), None);

        let keys = repo.list_for_user(ada.id).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "laptop");
        assert!(keys[0].last_used_at.is_some());

        repo.revoke(&record.id).await.unwrap();
        assert_eq!(repo.resolve(&plaintext).await.unwrap(), None);
        assert!(matches!(repo.revoke(&record.id).await, Err(RepositoryError::NotFound)));
    }
}
