//! Pods (single games of up to four players) and their results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::league::LeagueId;
use crate::user::UserId;

int_id!(
    /// Row id of a pod.
    PodId
);

/// Maximum number of players in a pod.
pub const MAX_POD_SIZE: usize = 4;

/// Pod lifecycle.
///
/// - Open: accepting players
/// - Active: full, game in progress
/// - Pending: result declared, waiting for every participant to confirm
/// - Complete: confirmed, stats applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Open,
    Active,
    Pending,
    Complete,
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodStatus::Open => write!(f, "open"),
            PodStatus::Active => write!(f, "active"),
            PodStatus::Pending => write!(f, "pending"),
            PodStatus::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for PodStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(PodStatus::Open),
            "active" => Ok(PodStatus::Active),
            "pending" => Ok(PodStatus::Pending),
            "complete" | "completed" => Ok(PodStatus::Complete),
            other => Err(format!("invalid pod status: '{other}'")),
        }
    }
}

/// A participant's outcome in a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
    /// Removed from the game; earns nothing.
    Disqualified,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Win => write!(f, "win"),
            GameResult::Loss => write!(f, "loss"),
            GameResult::Draw => write!(f, "draw"),
            GameResult::Disqualified => write!(f, "disqualified"),
        }
    }
}

impl FromStr for GameResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(GameResult::Win),
            "loss" => Ok(GameResult::Loss),
            "draw" => Ok(GameResult::Draw),
            "disqualified" => Ok(GameResult::Disqualified),
            other => Err(format!("invalid game result: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub id: PodId,
    pub league_id: LeagueId,
    pub creator_id: UserId,
    pub status: PodStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodParticipant {
    pub user_id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub result: Option<GameResult>,
    pub confirmed: bool,
    pub turn_order: Option<i64>,
    pub joined_at: DateTime<Utc>,
}

/// A pod with its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodDetails {
    #[serde(flatten)]
    pub pod: Pod,
    pub participants: Vec<PodParticipant>,
}

impl PodDetails {
    pub fn participant(&self, user_id: UserId) -> Option<&PodParticipant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_POD_SIZE
    }

    pub fn all_confirmed(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePodRequest {
    pub league_id: LeagueId,
}

/// Declare the outcome of an active pod: a single winner or a draw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclareResultRequest {
    pub winner_id: Option<UserId>,
    #[serde(default)]
    pub draw: bool,
}

/// Admin replacement for one participant row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    pub user_id: UserId,
    pub result: Option<GameResult>,
    #[serde(default)]
    pub confirmed: bool,
    pub turn_order: Option<i64>,
}

/// Admin override of a pod; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminUpdatePodRequest {
    pub participants: Option<Vec<ParticipantUpdate>>,
    pub status: Option<PodStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetResultRequest {
    pub result: GameResult,
}

/// Filter criteria for listing pods.
#[derive(Debug, Clone, Default)]
pub struct PodFilter {
    pub league_id: Option<LeagueId>,
    pub status: Option<PodStatus>,
    pub player_id: Option<UserId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Change to one player's record produced by a completed pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub user_id: UserId,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub points: i64,
}

impl StatsDelta {
    /// The same change with every counter negated.
    pub fn reversed(self) -> Self {
        Self {
            user_id: self.user_id,
            wins: -self.wins,
            losses: -self.losses,
            draws: -self.draws,
            points: -self.points,
        }
    }

    /// Matches played implied by this delta (+1, -1, or 0).
    pub fn matches(&self) -> i64 {
        self.wins + self.losses + self.draws
    }
}
