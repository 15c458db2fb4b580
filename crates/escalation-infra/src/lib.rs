//! Infrastructure layer for the Escalation League backend.
//!
//! Contains implementations of the repository traits defined in
//! `escalation-core`: SQLite storage, API key storage, the `config.toml`
//! loader and data directory resolution.

pub mod config;
pub mod filesystem;
pub mod sqlite;
