//! Role and permission administration.
//!
//! Reads go through a cached [`RbacSnapshot`] that every mutation
//! invalidates. Mutations run one at a time, are validated against a fresh
//! load of the role tables before they reach storage and are recorded in the
//! activity log.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use escalation_types::activity::{NewActivity, actions};
use escalation_types::error::{RbacError, RepositoryError};
use escalation_types::rbac::{
    CreateRoleRequest, FIXED_HIERARCHY_ROLES, Permission, PermissionId, PermissionMatrix, Role,
    RoleHierarchyView, RoleId, RolePermissionsChange, RolePermissionsView, SUPER_ADMIN,
    UNDELETABLE_ROLES, is_valid_role_name,
};
use escalation_types::user::UserId;
use serde_json::json;
use tokio::sync::Mutex;

use crate::rbac::RbacSnapshot;
use crate::repository::activity::ActivityLogRepository;
use crate::repository::rbac::RoleRepository;
use crate::service::activity::ActivityService;

fn storage(e: RepositoryError) -> RbacError {
    RbacError::StorageError(e.to_string())
}

pub struct RbacService<R: RoleRepository, A: ActivityLogRepository> {
    repo: R,
    activity: ActivityService<A>,
    snapshot: RwLock<Option<Arc<RbacSnapshot>>>,
    /// Bumped by every invalidation; a load only lands in the cache if no
    /// invalidation happened while it was in flight.
    generation: AtomicU64,
    write_lock: Mutex<()>,
}

impl<R: RoleRepository, A: ActivityLogRepository> RbacService<R, A> {
    pub fn new(repo: R, activity: ActivityService<A>) -> Self {
        Self {
            repo,
            activity,
            snapshot: RwLock::new(None),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    /// The current role tables, loaded on first use and after each mutation.
    pub async fn snapshot(&self) -> Result<Arc<RbacSnapshot>, RbacError> {
        if let Ok(guard) = self.snapshot.read() {
            if let Some(snapshot) = guard.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let snapshot = self.load().await?;
        self.store(generation, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Cache `snapshot` unless the tables were invalidated after `generation`.
    fn store(&self, generation: u64, snapshot: Arc<RbacSnapshot>) -> bool {
        let Ok(mut guard) = self.snapshot.write() else {
            return false;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        *guard = Some(snapshot);
        true
    }

    async fn load(&self) -> Result<Arc<RbacSnapshot>, RbacError> {
        let snapshot = Arc::new(self.repo.snapshot().await.map_err(storage)?);
        if let Err(cycle) = snapshot.graph().validate_acyclic() {
            tracing::warn!(role_id = %cycle, "role hierarchy contains a cycle");
        }
        Ok(snapshot)
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.snapshot.write() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *guard = None;
        }
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, RbacError> {
        Ok(self.snapshot().await?.permissions.clone())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, RbacError> {
        Ok(self.snapshot().await?.roles.clone())
    }

    pub async fn hierarchy(&self) -> Result<RoleHierarchyView, RbacError> {
        Ok(self.snapshot().await?.hierarchy_view())
    }

    pub async fn role_permissions(&self, role_id: RoleId) -> Result<RolePermissionsView, RbacError> {
        self.snapshot()
            .await?
            .role_permissions_view(role_id)
            .ok_or(RbacError::RoleNotFound)
    }

    pub async fn matrix(&self) -> Result<PermissionMatrix, RbacError> {
        Ok(self.snapshot().await?.matrix())
    }

    /// Names of every permission `role_id` holds, directly or inherited.
    pub async fn effective_permission_names(&self, role_id: RoleId) -> Result<Vec<String>, RbacError> {
        Ok(self
            .snapshot()
            .await?
            .effective_permissions(role_id)
            .into_iter()
            .map(|p| p.name)
            .collect())
    }

    /// Succeeds when `role_id` holds every permission in `required`.
    pub async fn authorize(&self, role_id: RoleId, required: &[&str]) -> Result<(), RbacError> {
        let missing = self.snapshot().await?.missing_permissions(role_id, required);
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::debug!(role_id = %role_id, missing = ?missing, "permission denied");
            Err(RbacError::Forbidden(missing))
        }
    }

    fn unknown_permissions(snapshot: &RbacSnapshot, ids: &[PermissionId]) -> Vec<PermissionId> {
        let mut unknown: Vec<PermissionId> = ids
            .iter()
            .copied()
            .filter(|id| snapshot.permission(*id).is_none())
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    pub async fn create_role(&self, actor: UserId, request: CreateRoleRequest) -> Result<Role, RbacError> {
        let name = request.name.trim().to_string();
        if !is_valid_role_name(&name) {
            return Err(RbacError::InvalidRoleName(name));
        }

        let _write = self.write_lock.lock().await;
        let snapshot = self.load().await?;
        if snapshot.role_by_name(&name).is_some() {
            return Err(RbacError::RoleNameConflict(name));
        }
        if let Some(parent) = request.parent_role_id {
            if snapshot.role(parent).is_none() {
                return Err(RbacError::ParentNotFound);
            }
        }
        let unknown = Self::unknown_permissions(&snapshot, &request.permission_ids);
        if !unknown.is_empty() {
            return Err(RbacError::InvalidPermissions(unknown));
        }

        let permission_ids: Vec<PermissionId> = request
            .permission_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let role = self
            .repo
            .create_role(&name, description, &permission_ids, request.parent_role_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => RbacError::RoleNameConflict(name.clone()),
                other => storage(other),
            })?;
        self.invalidate();

        tracing::info!(role_id = %role.id, name = %role.name, "created role");
        self.activity
            .log(NewActivity::new(actor, actions::ROLE_CREATED).with_metadata(json!({
                "description": format!("Created new role '{}'", role.name),
                "role_id": role.id,
                "name": role.name,
                "permission_ids": permission_ids,
                "parent_role_id": request.parent_role_id,
            })))
            .await;
        Ok(role)
    }

    /// Replace the direct permission set of a role.
    pub async fn update_role_permissions(
        &self,
        actor: UserId,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> Result<RolePermissionsChange, RbacError> {
        let _write = self.write_lock.lock().await;
        let snapshot = self.load().await?;
        let role = snapshot.role(role_id).ok_or(RbacError::RoleNotFound)?.clone();

        let unknown = Self::unknown_permissions(&snapshot, permission_ids);
        if !unknown.is_empty() {
            return Err(RbacError::InvalidPermissions(unknown));
        }

        let requested: BTreeSet<PermissionId> = permission_ids.iter().copied().collect();
        if role.name == SUPER_ADMIN && requested.len() < snapshot.permissions.len() {
            return Err(RbacError::SuperAdminMustKeepAll);
        }

        let current: BTreeSet<PermissionId> =
            snapshot.direct_permission_ids(role_id).into_iter().collect();
        let added: Vec<PermissionId> = requested.difference(&current).copied().collect();
        let removed: Vec<PermissionId> = current.difference(&requested).copied().collect();

        let ids: Vec<PermissionId> = requested.into_iter().collect();
        self.repo
            .replace_permissions(role_id, &ids)
            .await
            .map_err(storage)?;
        self.invalidate();

        self.activity
            .log(
                NewActivity::new(actor, actions::ROLE_PERMISSIONS_UPDATED).with_metadata(json!({
                    "description": format!("Updated permissions for role '{}'", role.name),
                    "role_id": role_id,
                    "role_name": role.name,
                    "added": added,
                    "removed": removed,
                })),
            )
            .await;

        Ok(RolePermissionsChange {
            role_id,
            added,
            removed,
        })
    }

    /// Make `role_id` inherit from `parent`, or from nothing.
    ///
    /// Only edges where `role_id` is the inheritor are replaced; roles that
    /// inherit from `role_id` keep their links.
    pub async fn update_role_hierarchy(
        &self,
        actor: UserId,
        role_id: RoleId,
        parent: Option<RoleId>,
    ) -> Result<(), RbacError> {
        let _write = self.write_lock.lock().await;
        let snapshot = self.load().await?;
        let role = snapshot.role(role_id).ok_or(RbacError::RoleNotFound)?.clone();
        if FIXED_HIERARCHY_ROLES.contains(&role.name.as_str()) {
            return Err(RbacError::ProtectedRole(role.name));
        }

        let graph = snapshot.graph();
        if let Some(parent) = parent {
            if snapshot.role(parent).is_none() {
                return Err(RbacError::ParentNotFound);
            }
            if graph.would_create_cycle(role_id, parent) {
                return Err(RbacError::WouldCreateCycle);
            }
        }

        let previous = graph.direct_children(role_id);
        self.repo.set_parent(role_id, parent).await.map_err(storage)?;
        self.invalidate();

        self.activity
            .log(
                NewActivity::new(actor, actions::ROLE_HIERARCHY_UPDATED).with_metadata(json!({
                    "description": format!("Updated hierarchy for role '{}'", role.name),
                    "role_id": role_id,
                    "role_name": role.name,
                    "previous_parent_ids": previous,
                    "new_parent_id": parent,
                })),
            )
            .await;
        Ok(())
    }

    pub async fn delete_role(&self, actor: UserId, role_id: RoleId) -> Result<(), RbacError> {
        let _write = self.write_lock.lock().await;
        let snapshot = self.load().await?;
        let role = snapshot.role(role_id).ok_or(RbacError::RoleNotFound)?.clone();
        if UNDELETABLE_ROLES.contains(&role.name.as_str()) {
            return Err(RbacError::ProtectedRole(role.name));
        }

        let holders = self
            .repo
            .count_users_with_role(role_id)
            .await
            .map_err(storage)?;
        if holders > 0 {
            return Err(RbacError::RoleInUse(holders));
        }

        let inheritors: Vec<String> = snapshot
            .graph()
            .direct_parents(role_id)
            .into_iter()
            .filter_map(|id| snapshot.role(id).map(|r| r.name.clone()))
            .collect();
        if !inheritors.is_empty() {
            return Err(RbacError::RoleHasInheritors(inheritors));
        }

        self.repo.delete_role(role_id).await.map_err(storage)?;
        self.invalidate();

        tracing::info!(role_id = %role_id, name = %role.name, "deleted role");
        self.activity
            .log(NewActivity::new(actor, actions::ROLE_DELETED).with_metadata(json!({
                "description": format!("Deleted role '{}'", role.name),
                "role_id": role_id,
                "role_name": role.name,
                "role_description": role.description,
            })))
            .await;
        Ok(())
    }
}
