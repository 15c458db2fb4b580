//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (escalation-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod activity;
pub mod budget;
pub mod league;
pub mod notification;
pub mod pod;
pub mod rbac;
pub mod user;
