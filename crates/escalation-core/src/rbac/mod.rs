//! Role hierarchy resolution.
//!
//! [`RbacSnapshot`] is an in-memory copy of the role tables. Everything
//! derived from the hierarchy (effective permissions, the permission matrix,
//! the hierarchy tree, authorization checks) is computed from a snapshot with
//! no further IO.

pub mod graph;

use std::collections::{BTreeMap, HashMap, HashSet};

use escalation_types::rbac::{
    HierarchyEdge, InheritedPermission, MatrixCell, MatrixRow, Permission, PermissionGrant,
    PermissionId, PermissionMatrix, Role, RoleHierarchyView, RoleId, RolePermission,
    RolePermissionsView, RoleSummary, RoleTreeNode,
};

pub use graph::RoleGraph;

/// Every role, permission, direct assignment and hierarchy edge.
#[derive(Debug, Clone, Default)]
pub struct RbacSnapshot {
    /// Ordered by id.
    pub roles: Vec<Role>,
    /// Ordered by name.
    pub permissions: Vec<Permission>,
    pub assignments: Vec<RolePermission>,
    pub edges: Vec<HierarchyEdge>,
}

impl RbacSnapshot {
    pub fn graph(&self) -> RoleGraph {
        RoleGraph::new(self.roles.iter().map(|r| r.id), &self.edges)
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id)
    }

    /// Permission ids assigned directly to `role`.
    pub fn direct_permission_ids(&self, role: RoleId) -> HashSet<PermissionId> {
        self.assignments
            .iter()
            .filter(|a| a.role_id == role)
            .map(|a| a.permission_id)
            .collect()
    }

    /// How `role` holds each of its effective permissions.
    ///
    /// Direct grants win. An inherited permission is attributed to the
    /// nearest inherited role that holds it directly.
    pub fn grants(&self, graph: &RoleGraph, role: RoleId) -> BTreeMap<PermissionId, PermissionGrant> {
        let mut grants = BTreeMap::new();
        for id in self.direct_permission_ids(role) {
            grants.insert(id, PermissionGrant::Direct);
        }

        for source in graph.inherited_roles(role) {
            let source_name = self
                .role(source)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| source.to_string());
            let mut ids: Vec<PermissionId> = self.direct_permission_ids(source).into_iter().collect();
            ids.sort();
            for id in ids {
                grants.entry(id).or_insert_with(|| PermissionGrant::Inherited {
                    source_role_id: source,
                    source_role_name: source_name.clone(),
                });
            }
        }
        grants
    }

    /// Direct and inherited permissions of `role`, ordered by name.
    pub fn effective_permissions(&self, role: RoleId) -> Vec<Permission> {
        let grants = self.grants(&self.graph(), role);
        self.permissions
            .iter()
            .filter(|p| grants.contains_key(&p.id))
            .cloned()
            .collect()
    }

    /// Names from `required` that `role` does not hold, in the given order.
    pub fn missing_permissions(&self, role: RoleId, required: &[&str]) -> Vec<String> {
        let held: HashSet<String> = self
            .effective_permissions(role)
            .into_iter()
            .map(|p| p.name)
            .collect();
        required
            .iter()
            .filter(|name| !held.contains(**name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Direct permissions, inherited-only permissions and inherited roles of `role`.
    pub fn role_permissions_view(&self, role_id: RoleId) -> Option<RolePermissionsView> {
        let role = self.role(role_id)?.clone();
        let graph = self.graph();
        let grants = self.grants(&graph, role_id);

        let mut direct = Vec::new();
        let mut inherited = Vec::new();
        for permission in &self.permissions {
            match grants.get(&permission.id) {
                Some(PermissionGrant::Direct) => direct.push(permission.clone()),
                Some(PermissionGrant::Inherited {
                    source_role_id,
                    source_role_name,
                }) => inherited.push(InheritedPermission {
                    permission: permission.clone(),
                    source_role_id: *source_role_id,
                    source_role_name: source_role_name.clone(),
                }),
                None => {}
            }
        }

        let inherited_roles = graph
            .inherited_roles(role_id)
            .into_iter()
            .filter_map(|id| self.role(id).cloned())
            .collect();

        Some(RolePermissionsView {
            role,
            direct,
            inherited,
            inherited_roles,
        })
    }

    /// The full role x permission table.
    pub fn matrix(&self) -> PermissionMatrix {
        let graph = self.graph();
        let roles = self
            .roles
            .iter()
            .map(|role| {
                let grants = self.grants(&graph, role.id);
                let permissions = self
                    .permissions
                    .iter()
                    .map(|p| {
                        let cell = grants
                            .get(&p.id)
                            .map(MatrixCell::from)
                            .unwrap_or_else(MatrixCell::none);
                        (p.id, cell)
                    })
                    .collect();
                MatrixRow {
                    role: role.clone(),
                    permissions,
                    inherited_roles: graph.inherited_roles(role.id),
                }
            })
            .collect();

        PermissionMatrix {
            permissions: self.permissions.clone(),
            roles,
        }
    }

    /// Roles with their neighbours plus the hierarchy as a forest.
    ///
    /// Roots are roles nothing inherits from that do inherit from something.
    /// A branch stops when it would revisit a role already on its path.
    pub fn hierarchy_view(&self) -> RoleHierarchyView {
        let graph = self.graph();
        let by_id: HashMap<RoleId, &Role> = self.roles.iter().map(|r| (r.id, r)).collect();

        let roles: Vec<RoleSummary> = self
            .roles
            .iter()
            .map(|r| RoleSummary {
                id: r.id,
                name: r.name.clone(),
                description: r.description.clone(),
                parents: graph.direct_parents(r.id),
                children: graph.direct_children(r.id),
            })
            .collect();

        let tree = roles
            .iter()
            .filter(|r| r.parents.is_empty() && !r.children.is_empty())
            .filter_map(|r| build_tree(&graph, &by_id, r.id, &mut Vec::new()))
            .collect();

        RoleHierarchyView {
            roles,
            tree,
            edges: self.edges.clone(),
        }
    }
}

fn build_tree(
    graph: &RoleGraph,
    by_id: &HashMap<RoleId, &Role>,
    role_id: RoleId,
    path: &mut Vec<RoleId>,
) -> Option<RoleTreeNode> {
    if path.contains(&role_id) {
        return None;
    }
    let role = by_id.get(&role_id)?;

    path.push(role_id);
    let children = graph
        .direct_children(role_id)
        .into_iter()
        .filter_map(|child| build_tree(graph, by_id, child, path))
        .collect();
    path.pop();

    Some(RoleTreeNode {
        id: role.id,
        name: role.name.clone(),
        description: role.description.clone(),
        children,
    })
}
