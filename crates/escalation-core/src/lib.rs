//! Business logic and repository trait definitions for the Escalation League backend.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, the role hierarchy resolver, the league calendar and the
//! services that orchestrate them. It depends only on `escalation-types` --
//! never on `escalation-infra` or any database/IO crate.

pub mod cache;
pub mod calendar;
pub mod rbac;
pub mod repository;
pub mod service;
