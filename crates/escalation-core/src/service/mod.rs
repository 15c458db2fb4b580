//! Business logic services (use cases).
//!
//! Services orchestrate repository calls and business rules. They depend on
//! traits (ports) -- never on concrete infrastructure implementations.

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub mod activity;
pub mod budget;
pub mod league;
pub mod notification;
pub mod pod;
pub mod rbac;
pub mod user;

/// Source of the current instant. Swapped out in tests to pin league weeks.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A clock frozen at `at`.
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}
