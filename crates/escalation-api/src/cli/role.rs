//! Role CLI commands: list, matrix, tree, check.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use escalation_types::rbac::{PermissionMatrix, RoleId, RoleTreeNode};

use crate::cli::plural;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum RoleCommand {
    /// List roles with their direct hierarchy neighbours.
    #[command(alias = "ls")]
    List,

    /// Show the role x permission matrix.
    Matrix,

    /// Print the inheritance tree.
    Tree,

    /// Check whether a role holds a permission, and where it comes from.
    Check { role: String, permission: String },
}

pub async fn run(state: &AppState, action: RoleCommand, json: bool) -> Result<()> {
    match action {
        RoleCommand::List => list_roles(state, json).await,
        RoleCommand::Matrix => matrix(state, json).await,
        RoleCommand::Tree => tree(state, json).await,
        RoleCommand::Check { role, permission } => check(state, &role, &permission, json).await,
    }
}

async fn list_roles(state: &AppState, json: bool) -> Result<()> {
    let view = state.rbac_service.hierarchy().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view.roles)?);
        return Ok(());
    }

    let name_of = |id: RoleId| {
        view.roles
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.name.as_str())
            .unwrap_or("?")
    };

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Inherits from").fg(Color::White),
        Cell::new("Inherited by").fg(Color::White),
    ]);
    for role in &view.roles {
        let children: Vec<&str> = role.children.iter().map(|id| name_of(*id)).collect();
        let parents: Vec<&str> = role.parents.iter().map(|id| name_of(*id)).collect();
        table.add_row(vec![
            Cell::new(role.id).fg(Color::DarkGrey),
            Cell::new(&role.name).fg(Color::Cyan),
            Cell::new(children.join(", ")),
            Cell::new(parents.join(", ")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {}", plural(view.roles.len(), "role"));
    println!();
    Ok(())
}

async fn matrix(state: &AppState, json: bool) -> Result<()> {
    let matrix = state.rbac_service.matrix().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
        return Ok(());
    }

    println!();
    println!("{}", matrix_table(&matrix));
    println!();
    println!(
        "  {} direct   {} inherited",
        style("●").green(),
        style("○").cyan()
    );
    println!();
    Ok(())
}

/// One row per permission, one column per role.
fn matrix_table(matrix: &PermissionMatrix) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("Permission").fg(Color::White)];
    header.extend(
        matrix
            .roles
            .iter()
            .map(|row| Cell::new(&row.role.name).fg(Color::White)),
    );
    table.set_header(header);

    for permission in &matrix.permissions {
        let mut cells = vec![Cell::new(&permission.name).fg(Color::Cyan)];
        for row in &matrix.roles {
            let cell = match row.permissions.get(&permission.id) {
                Some(c) if c.is_direct => Cell::new("●").fg(Color::Green),
                Some(c) if c.has_permission => Cell::new("○").fg(Color::Cyan),
                _ => Cell::new(""),
            };
            cells.push(cell);
        }
        table.add_row(cells);
    }
    table
}

async fn tree(state: &AppState, json: bool) -> Result<()> {
    let view = state.rbac_service.hierarchy().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view.tree)?);
        return Ok(());
    }

    println!();
    let mut lines = Vec::new();
    for root in &view.tree {
        render_tree(root, "", true, true, &mut lines);
    }
    for line in lines {
        println!("  {line}");
    }
    println!();
    Ok(())
}

fn render_tree(node: &RoleTreeNode, prefix: &str, last: bool, root: bool, out: &mut Vec<String>) {
    let (branch, next_prefix) = if root {
        (String::new(), String::new())
    } else if last {
        (format!("{prefix}└── "), format!("{prefix}    "))
    } else {
        (format!("{prefix}├── "), format!("{prefix}│   "))
    };
    out.push(format!("{branch}{}", node.name));

    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_tree(child, &next_prefix, i + 1 == count, false, out);
    }
}

async fn check(state: &AppState, role: &str, permission: &str, json: bool) -> Result<()> {
    let matrix = state.rbac_service.matrix().await?;
    let Some(row) = matrix.roles.iter().find(|r| r.role.name == role) else {
        bail!("unknown role '{role}'");
    };
    let Some(perm) = matrix.permissions.iter().find(|p| p.name == permission) else {
        bail!("unknown permission '{permission}'");
    };
    let cell = row.permissions.get(&perm.id);
    let granted = cell.is_some_and(|c| c.has_permission);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "role": role,
                "permission": permission,
                "granted": granted,
                "grant": cell,
            }))?
        );
        return Ok(());
    }

    match cell {
        Some(c) if c.is_direct => println!(
            "  {} {} holds {} directly",
            style("✓").green().bold(),
            style(role).bold(),
            style(permission).cyan()
        ),
        Some(c) if c.has_permission => println!(
            "  {} {} inherits {} from {}",
            style("✓").green().bold(),
            style(role).bold(),
            style(permission).cyan(),
            style(c.source_role_name.as_deref().unwrap_or("?")).bold()
        ),
        _ => println!(
            "  {} {} does not hold {}",
            style("✗").red().bold(),
            style(role).bold(),
            style(permission).cyan()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, name: &str, children: Vec<RoleTreeNode>) -> RoleTreeNode {
        RoleTreeNode {
            id: RoleId(id),
            name: name.to_string(),
            description: None,
            children,
        }
    }

    #[test]
    fn test_render_tree_draws_branches() {
        let root = node(
            1,
            "super_admin",
            vec![
                node(2, "league_admin", vec![node(3, "pod_admin", vec![])]),
                node(4, "user_admin", vec![]),
            ],
        );
        let mut lines = Vec::new();
        render_tree(&root, "", true, true, &mut lines);
        assert_eq!(
            lines,
            vec![
                "super_admin",
                "├── league_admin",
                "│   └── pod_admin",
                "└── user_admin",
            ]
        );
    }
}
