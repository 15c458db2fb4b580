//! REST API handlers, one module per resource.

pub mod activity;
pub mod budgets;
pub mod leagues;
pub mod notifications;
pub mod pods;
pub mod roles;
pub mod users;
