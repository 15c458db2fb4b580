//! Escalation League CLI and REST API entry point.
//!
//! Binary name: `escl`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use escalation_observe::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,escalation=debug",
        _ => "trace",
    };
    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    if let Err(e) = init_tracing(TracingOptions {
        format: cli.log_format,
        otel,
        default_directive: default_directive.to_string(),
    }) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "escl", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host, .. } => serve(state, port, host, cli.quiet).await,
        Commands::Status => cli::status::status(&state, cli.json).await,
        Commands::User { action } => cli::user::run(&state, action, cli.json).await,
        Commands::Key { action } => cli::key::run(&state, action, cli.json).await,
        Commands::League { action } => cli::league::run(&state, action, cli.json).await,
        Commands::Role { action } => cli::role::run(&state, action, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}

async fn serve(
    state: AppState,
    port: Option<u16>,
    host: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    // Ensure an API key exists, print it if new
    if let Some(api_key) = http::extractors::auth::ensure_api_key(&state).await? {
        println!();
        println!(
            "  {} API key generated for {} (save this -- it won't be shown again):",
            console::style("🔑").bold(),
            http::extractors::auth::BOOTSTRAP_ADMIN_EMAIL
        );
        println!();
        println!("  {}", console::style(&api_key).yellow().bold());
        println!();
    }

    let cancel = CancellationToken::new();
    if let Some(cache) = state.cache.clone() {
        let interval = Duration::from_secs(state.config.cache.sweep_interval_secs.max(1));
        escalation_core::cache::spawn_sweeper(cache, interval, cancel.clone());
    }

    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "escalation api listening");
    if !quiet {
        println!(
            "  {} Escalation League API listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let router = http::router::build_router(state);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(served?)
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
