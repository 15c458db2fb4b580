//! Role inheritance graph, reachability and cycle detection.
//!
//! Uses `petgraph` to model the hierarchy as a directed graph with an edge
//! from each inheriting role to the role it inherits from. A role's inherited
//! roles are everything reachable from it. Traversals keep a visited set, so
//! a cycle already present in storage never recurses forever.

use std::collections::{HashMap, HashSet, VecDeque};

use escalation_types::rbac::{HierarchyEdge, RoleId};
use petgraph::Direction;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

/// Directed role graph: `a -> b` means role `a` inherits from role `b`.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    graph: DiGraph<RoleId, ()>,
    nodes: HashMap<RoleId, NodeIndex>,
}

impl RoleGraph {
    /// Build the graph from known roles and hierarchy edges.
    ///
    /// Roles that only appear in edges are added as nodes too.
    pub fn new(roles: impl IntoIterator<Item = RoleId>, edges: &[HierarchyEdge]) -> Self {
        let mut graph = RoleGraph::default();
        for role in roles {
            graph.ensure_node(role);
        }
        for edge in edges {
            let from = graph.ensure_node(edge.parent_role_id);
            let to = graph.ensure_node(edge.child_role_id);
            graph.graph.update_edge(from, to, ());
        }
        graph
    }

    fn ensure_node(&mut self, role: RoleId) -> NodeIndex {
        if let Some(idx) = self.nodes.get(&role) {
            return *idx;
        }
        let idx = self.graph.add_node(role);
        self.nodes.insert(role, idx);
        idx
    }

    pub fn contains(&self, role: RoleId) -> bool {
        self.nodes.contains_key(&role)
    }

    /// Roles `role` inherits from directly, ascending by id.
    pub fn direct_children(&self, role: RoleId) -> Vec<RoleId> {
        self.neighbours(role, Direction::Outgoing)
    }

    /// Roles that inherit from `role` directly, ascending by id.
    pub fn direct_parents(&self, role: RoleId) -> Vec<RoleId> {
        self.neighbours(role, Direction::Incoming)
    }

    fn neighbours(&self, role: RoleId, direction: Direction) -> Vec<RoleId> {
        let Some(&idx) = self.nodes.get(&role) else {
            return Vec::new();
        };
        let mut ids: Vec<RoleId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Every role reachable from `role`, excluding `role` itself.
    ///
    /// Breadth-first with neighbours visited in id order, so nearer roles come
    /// first and the order is stable across calls.
    pub fn inherited_roles(&self, role: RoleId) -> Vec<RoleId> {
        if !self.contains(role) {
            return Vec::new();
        }

        let mut seen: HashSet<RoleId> = HashSet::from([role]);
        let mut queue: VecDeque<RoleId> = VecDeque::from([role]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for child in self.direct_children(current) {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// `role` followed by all of its inherited roles.
    pub fn accessible_roles(&self, role: RoleId) -> Vec<RoleId> {
        let mut roles = vec![role];
        roles.extend(self.inherited_roles(role));
        roles
    }

    /// True when `role` inherits (transitively) from `ancestor`.
    pub fn inherits_from(&self, role: RoleId, ancestor: RoleId) -> bool {
        match (self.nodes.get(&role), self.nodes.get(&ancestor)) {
            (Some(&from), Some(&to)) if from != to => {
                has_path_connecting(&self.graph, from, to, None)
            }
            _ => false,
        }
    }

    /// Would adding `role -> new_parent` close a cycle?
    ///
    /// A self edge counts as a cycle. Otherwise the edge closes a cycle when
    /// `new_parent` already inherits from `role`.
    pub fn would_create_cycle(&self, role: RoleId, new_parent: RoleId) -> bool {
        role == new_parent || self.inherits_from(new_parent, role)
    }

    /// Check the whole edge set is acyclic. On failure returns a role on a cycle.
    pub fn validate_acyclic(&self) -> Result<(), RoleId> {
        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| self.graph[cycle.node_id()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(parent: i64, child: i64) -> HierarchyEdge {
        HierarchyEdge {
            parent_role_id: RoleId(parent),
            child_role_id: RoleId(child),
        }
    }

    /// super_admin(1) -> league_admin(2), user_admin(4)
    /// league_admin(2) -> pod_admin(3) -> league_user(6) -> user(5)
    /// user_admin(4) -> user(5)
    fn default_hierarchy() -> RoleGraph {
        RoleGraph::new(
            (1..=6).map(RoleId),
            &[edge(1, 2), edge(1, 4), edge(2, 3), edge(3, 6), edge(4, 5), edge(6, 5)],
        )
    }

    fn ids(raw: &[i64]) -> Vec<RoleId> {
        raw.iter().copied().map(RoleId).collect()
    }

    #[test]
    fn test_inherited_roles_transitive_and_deduplicated() {
        let g = default_hierarchy();
        // user(5) is reachable through both branches but listed once.
        assert_eq!(g.inherited_roles(RoleId(1)), ids(&[2, 4, 3, 5, 6]));
        assert_eq!(g.inherited_roles(RoleId(2)), ids(&[3, 6, 5]));
        assert_eq!(g.inherited_roles(RoleId(5)), Vec::<RoleId>::new());
    }

    #[test]
    fn test_accessible_roles_starts_with_self() {
        let g = default_hierarchy();
        assert_eq!(g.accessible_roles(RoleId(6)), ids(&[6, 5]));
    }

    #[test]
    fn test_unknown_role_has_no_inheritance() {
        let g = default_hierarchy();
        assert!(g.inherited_roles(RoleId(99)).is_empty());
        assert!(!g.inherits_from(RoleId(99), RoleId(5)));
    }

    #[test]
    fn test_direct_neighbours() {
        let g = default_hierarchy();
        assert_eq!(g.direct_children(RoleId(1)), ids(&[2, 4]));
        assert_eq!(g.direct_parents(RoleId(5)), ids(&[4, 6]));
    }

    #[test]
    fn test_would_create_cycle() {
        let g = default_hierarchy();
        // user -> super_admin would close super_admin -> ... -> user.
        assert!(g.would_create_cycle(RoleId(5), RoleId(1)));
        assert!(g.would_create_cycle(RoleId(3), RoleId(2)));
        // Self edge.
        assert!(g.would_create_cycle(RoleId(4), RoleId(4)));
        // user_admin -> league_user is fine.
        assert!(!g.would_create_cycle(RoleId(4), RoleId(6)));
    }

    #[test]
    fn test_cycles_in_storage_terminate() {
        let g = RoleGraph::new(ids(&[1, 2, 3]), &[edge(1, 2), edge(2, 3), edge(3, 1)]);
        assert_eq!(g.inherited_roles(RoleId(1)), ids(&[2, 3]));
        assert!(g.validate_acyclic().is_err());
    }

    #[test]
    fn test_validate_acyclic_default() {
        assert!(default_hierarchy().validate_acyclic().is_ok());
    }

    #[test]
    fn test_edges_add_missing_nodes() {
        let g = RoleGraph::new(Vec::new(), &[edge(7, 8)]);
        assert!(g.contains(RoleId(7)));
        assert_eq!(g.inherited_roles(RoleId(7)), ids(&[8]));
    }
}
