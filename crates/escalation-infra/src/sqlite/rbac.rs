//! SQLite role/permission repository implementation.

use escalation_core::rbac::RbacSnapshot;
use escalation_core::repository::rbac::RoleRepository;
use escalation_types::error::RepositoryError;
use escalation_types::rbac::{HierarchyEdge, Permission, PermissionId, Role, RoleId, RolePermission};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{is_unique_violation, query_err};

/// SQLite-backed implementation of `RoleRepository`.
#[derive(Clone)]
pub struct SqliteRoleRepository {
    pool: DatabasePool,
}

impl SqliteRoleRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn permission_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Permission, sqlx::Error> {
    Ok(Permission {
        id: PermissionId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

impl RoleRepository for SqliteRoleRepository {
    async fn snapshot(&self) -> Result<RbacSnapshot, RepositoryError> {
        let reader = &self.pool.reader;

        let roles = sqlx::query("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(reader)
            .await
            .map_err(query_err)?
            .iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        let permissions = sqlx::query("SELECT id, name, description FROM permissions ORDER BY name")
            .fetch_all(reader)
            .await
            .map_err(query_err)?
            .iter()
            .map(permission_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        let assignments: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT role_id, permission_id FROM role_permissions ORDER BY role_id, permission_id",
        )
        .fetch_all(reader)
        .await
        .map_err(query_err)?;

        let edges: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT parent_role_id, child_role_id FROM role_hierarchy ORDER BY parent_role_id, child_role_id",
        )
        .fetch_all(reader)
        .await
        .map_err(query_err)?;

        Ok(RbacSnapshot {
            roles,
            permissions,
            assignments: assignments
                .into_iter()
                .map(|(role, permission)| RolePermission {
                    role_id: RoleId(role),
                    permission_id: PermissionId(permission),
                })
                .collect(),
            edges: edges
                .into_iter()
                .map(|(parent, child)| HierarchyEdge {
                    parent_role_id: RoleId(parent),
                    child_role_id: RoleId(child),
                })
                .collect(),
        })
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(role_from_row).transpose().map_err(query_err)
    }

    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        permission_ids: &[PermissionId],
        inherits_from: Option<RoleId>,
    ) -> Result<Role, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let inserted = sqlx::query("INSERT INTO roles (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await;
        let role_id = match inserted {
            Ok(done) => RoleId(done.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => {
                return Err(RepositoryError::Conflict(format!("role '{name}' already exists")));
            }
            Err(e) => return Err(query_err(e)),
        };

        for permission_id in permission_ids {
            sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(role_id.get())
                .bind(permission_id.get())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        if let Some(parent) = inherits_from {
            sqlx::query("INSERT INTO role_hierarchy (parent_role_id, child_role_id) VALUES (?, ?)")
                .bind(role_id.get())
                .bind(parent.get())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)?;

        Ok(Role {
            id: role_id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    async fn replace_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        for permission_id in permission_ids {
            sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
                .bind(role_id.get())
                .bind(permission_id.get())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)
    }

    async fn set_parent(&self, role_id: RoleId, inherits_from: Option<RoleId>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query("DELETE FROM role_hierarchy WHERE parent_role_id = ?")
            .bind(role_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        if let Some(parent) = inherits_from {
            sqlx::query("INSERT INTO role_hierarchy (parent_role_id, child_role_id) VALUES (?, ?)")
                .bind(role_id.get())
                .bind(parent.get())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        tx.commit().await.map_err(query_err)
    }

    async fn delete_role(&self, role_id: RoleId) -> Result<(), RepositoryError> {
        // Assignments and hierarchy edges go with the role via ON DELETE CASCADE.
        let done = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(role_id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
            .bind(role_id.get())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::testing::test_pool;
    use escalation_types::rbac::{LEAGUE_USER, SUPER_ADMIN};

    #[tokio::test]
    async fn test_seeded_snapshot_resolves_inheritance() {
        let repo = SqliteRoleRepository::new(test_pool().await);
        let snapshot = repo.snapshot().await.unwrap();

        assert_eq!(snapshot.roles.len(), 6);
        assert_eq!(snapshot.roles[0].name, SUPER_ADMIN);
        assert_eq!(snapshot.permissions.len(), 27);
        assert!(snapshot.graph().validate_acyclic().is_ok());

        let league_user = snapshot.role_by_name(LEAGUE_USER).unwrap().id;
        let names: Vec<String> = snapshot
            .effective_permissions(league_user)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(names.contains(&"pod_create".to_string()));
        // inherited from `user`
        assert!(names.contains(&"league_signup".to_string()));
        assert!(!names.contains(&"league_create".to_string()));
    }

    #[tokio::test]
    async fn test_create_role_with_parent() {
        let repo = SqliteRoleRepository::new(test_pool().await);
        let role = repo
            .create_role("judge", Some("Rules judge"), &[PermissionId(16)], Some(RoleId(6)))
            .await
            .unwrap();

        let snapshot = repo.snapshot().await.unwrap();
        assert!(snapshot.edges.contains(&HierarchyEdge {
            parent_role_id: role.id,
            child_role_id: RoleId(6),
        }));
        let names: Vec<String> = snapshot
            .effective_permissions(role.id)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(names.contains(&"pod_manage".to_string()));
        assert!(names.contains(&"pod_create".to_string()));

        let err = repo.create_role("judge", None, &[], None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_replace_permissions_and_set_parent() {
        let repo = SqliteRoleRepository::new(test_pool().await);
        let role = repo.create_role("judge", None, &[PermissionId(1)], None).await.unwrap();

        repo.replace_permissions(role.id, &[PermissionId(12), PermissionId(16)])
            .await
            .unwrap();
        let snapshot = repo.snapshot().await.unwrap();
        let direct = snapshot.direct_permission_ids(role.id);
        assert_eq!(direct.len(), 2);
        assert!(!direct.contains(&PermissionId(1)));

        repo.set_parent(role.id, Some(RoleId(5))).await.unwrap();
        repo.set_parent(role.id, Some(RoleId(6))).await.unwrap();
        let snapshot = repo.snapshot().await.unwrap();
        let parents: Vec<_> = snapshot
            .edges
            .iter()
            .filter(|e| e.parent_role_id == role.id)
            .collect();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].child_role_id, RoleId(6));

        repo.set_parent(role.id, None).await.unwrap();
        let snapshot = repo.snapshot().await.unwrap();
        assert!(snapshot.edges.iter().all(|e| e.parent_role_id != role.id));
    }

    #[tokio::test]
    async fn test_delete_role_cascades() {
        let repo = SqliteRoleRepository::new(test_pool().await);
        let role = repo
            .create_role("judge", None, &[PermissionId(16)], Some(RoleId(6)))
            .await
            .unwrap();
        assert_eq!(repo.count_users_with_role(role.id).await.unwrap(), 0);

        repo.delete_role(role.id).await.unwrap();
        assert!(repo.get_role(role.id).await.unwrap().is_none());
        let snapshot = repo.snapshot().await.unwrap();
        assert!(snapshot.assignments.iter().all(|a| a.role_id != role.id));
        assert!(snapshot.edges.iter().all(|e| e.parent_role_id != role.id));

        assert!(matches!(repo.delete_role(role.id).await, Err(RepositoryError::NotFound)));
    }
}
