//! User account CLI commands: create, list, role.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Input;

use escalation_types::user::{CreateUserRequest, User, UserFilter};

use crate::cli::{operator, plural};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create an account (prompts for missing names).
    Create {
        email: String,
        #[arg(long)]
        firstname: Option<String>,
        #[arg(long)]
        lastname: Option<String>,
        /// Role name (defaults to league_user).
        #[arg(long)]
        role: Option<String>,
    },

    /// List accounts.
    #[command(alias = "ls")]
    List {
        /// Substring match on email or name.
        #[arg(long)]
        search: Option<String>,
        /// Only accounts with this role name.
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Change an account's role.
    Role { email: String, role: String },
}

pub async fn run(state: &AppState, action: UserCommand, json: bool) -> Result<()> {
    match action {
        UserCommand::Create {
            email,
            firstname,
            lastname,
            role,
        } => create_user(state, email, firstname, lastname, role, json).await,
        UserCommand::List {
            search,
            role,
            page,
            limit,
        } => list_users(state, search, role, page, limit, json).await,
        UserCommand::Role { email, role } => change_role(state, &email, &role, json).await,
    }
}

async fn create_user(
    state: &AppState,
    email: String,
    firstname: Option<String>,
    lastname: Option<String>,
    role: Option<String>,
    json: bool,
) -> Result<()> {
    let firstname = match firstname {
        Some(name) => name,
        None => Input::<String>::new().with_prompt("First name").interact_text()?,
    };
    let lastname = match lastname {
        Some(name) => name,
        None => Input::<String>::new().with_prompt("Last name").interact_text()?,
    };

    let actor = operator(state).await.ok().map(|u| u.id);
    let user = state
        .user_service
        .create_user(
            actor,
            CreateUserRequest {
                email,
                firstname,
                lastname,
                role,
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!(
            "  {} Created {} <{}> as {}",
            style("✓").green().bold(),
            style(user.display_name()).bold(),
            user.email,
            style(&user.role_name).cyan()
        );
    }
    Ok(())
}

async fn list_users(
    state: &AppState,
    search: Option<String>,
    role: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let role_id = match role {
        Some(name) => Some(state.user_service.role_id(&name).await?),
        None => None,
    };
    let filter = UserFilter {
        search,
        role_id,
        ..Default::default()
    };
    let result = state.user_service.list_users(&filter, page, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.items.is_empty() {
        println!();
        println!("  {} No users match.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Email").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("W-L-D").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);
    for user in &result.items {
        table.add_row(vec![
            Cell::new(user.id).fg(Color::DarkGrey),
            Cell::new(user.display_name()).fg(Color::Cyan),
            Cell::new(&user.email),
            Cell::new(&user.role_name),
            Cell::new(format!("{}-{}-{}", user.wins, user.losses, user.draws)),
            status_cell(user),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} (page {} of {})",
        plural(result.pagination.total as usize, "user"),
        result.pagination.page,
        result.pagination.total_pages.max(1)
    );
    println!();
    Ok(())
}

fn status_cell(user: &User) -> Cell {
    if user.is_deleted {
        Cell::new("deleted").fg(Color::Red)
    } else if user.is_active {
        Cell::new("active").fg(Color::Green)
    } else {
        Cell::new("inactive").fg(Color::Yellow)
    }
}

async fn change_role(state: &AppState, email: &str, role: &str, json: bool) -> Result<()> {
    let actor = operator(state).await?;
    let target = state.user_service.get_by_email(email).await?;
    let role_id = state.user_service.role_id(role).await?;
    let user = state
        .user_service
        .change_role(actor.id, target.id, role_id)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        println!(
            "  {} {} is now {} (was {})",
            style("✓").green().bold(),
            style(&user.email).bold(),
            style(&user.role_name).cyan(),
            target.role_name
        );
    }
    Ok(())
}
