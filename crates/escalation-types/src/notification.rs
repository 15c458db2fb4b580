use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::league::LeagueId;
use crate::pod::PodId;
use crate::user::UserId;

int_id!(
    /// Row id of a notification.
    NotificationId
);

/// Maximum notifications returned by a single list call.
pub const MAX_LIST_LIMIT: i64 = 100;
pub const DEFAULT_LIST_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "error" => Ok(NotificationKind::Error),
            other => Err(format!("invalid notification type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Content of a notification before it is addressed to anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    pub link: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: None,
            kind,
            link: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    pub user_id: UserId,
    #[serde(flatten)]
    pub notification: NewNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkNotificationRequest {
    pub user_ids: Vec<UserId>,
    #[serde(flatten)]
    pub notification: NewNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub unread: i64,
}

/// Canned notifications sent by league workflows.
pub mod templates {
    use super::*;

    pub fn signup_approved(league_name: &str, league_id: LeagueId) -> NewNotification {
        NewNotification::new(NotificationKind::Success, "League signup approved")
            .with_message(format!("You're in! Welcome to {league_name}."))
            .with_link(format!("/leagues/{league_id}"))
    }

    pub fn signup_rejected(league_name: &str) -> NewNotification {
        NewNotification::new(NotificationKind::Warning, "League signup declined")
            .with_message(format!("Your request to join {league_name} was not approved."))
    }

    pub fn new_signup_request(player_name: &str, league_name: &str, league_id: LeagueId) -> NewNotification {
        NewNotification::new(NotificationKind::Info, "New league signup")
            .with_message(format!("{player_name} joined {league_name}."))
            .with_link(format!("/admin/leagues/{league_id}/participants"))
    }

    pub fn pod_assigned(pod_id: PodId) -> NewNotification {
        NewNotification::new(NotificationKind::Info, "Your pod is ready")
            .with_message(format!("Pod #{pod_id} is full and the game can start."))
            .with_link(format!("/pods/{pod_id}"))
    }

    pub fn confirm_game(pod_id: PodId) -> NewNotification {
        NewNotification::new(NotificationKind::Warning, "Confirm game result")
            .with_message(format!("A result was declared for pod #{pod_id}. Please confirm it."))
            .with_link(format!("/pods/{pod_id}"))
    }

    pub fn game_complete(pod_id: PodId) -> NewNotification {
        NewNotification::new(NotificationKind::Success, "Game complete")
            .with_message(format!("Every player confirmed pod #{pod_id}. Standings are updated."))
            .with_link(format!("/pods/{pod_id}"))
    }
}
