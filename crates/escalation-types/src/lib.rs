//! Shared domain types for the Escalation League backend.
//!
//! This crate contains the domain types used across the workspace: users,
//! roles and permissions, leagues, pods, budgets, notifications, activity
//! logs, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

/// Declare an integer row identifier newtype.
///
/// Every entity is keyed by a SQLite `INTEGER PRIMARY KEY`; the newtypes keep
/// a `LeagueId` from being passed where a `UserId` is expected.
macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// The raw row id.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

pub mod activity;
pub mod budget;
pub mod config;
pub mod error;
pub mod league;
pub mod money;
pub mod notification;
pub mod page;
pub mod pod;
pub mod rbac;
pub mod user;
