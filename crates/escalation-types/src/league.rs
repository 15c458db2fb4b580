use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::user::UserId;

int_id!(
    /// Row id of a league.
    LeagueId
);

pub const DEFAULT_POINTS_PER_WIN: i64 = 4;
pub const DEFAULT_POINTS_PER_LOSS: i64 = 1;
pub const DEFAULT_POINTS_PER_DRAW: i64 = 1;

/// A league season.
///
/// The season runs from local midnight of `start_date` to local midnight of
/// `end_date` in the configured league timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Budget granted to every participant each week.
    pub weekly_budget: Money,
    pub is_active: bool,
    pub league_code: Option<String>,
    pub max_players: Option<i64>,
    pub points_per_win: i64,
    pub points_per_loss: i64,
    pub points_per_draw: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeagueRequest {
    pub name: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub weekly_budget: Money,
    pub league_code: Option<String>,
    pub max_players: Option<i64>,
    pub points_per_win: Option<i64>,
    pub points_per_loss: Option<i64>,
    pub points_per_draw: Option<i64>,
}

/// Partial league update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLeagueRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub weekly_budget: Option<Money>,
    pub league_code: Option<String>,
    pub max_players: Option<i64>,
    pub points_per_win: Option<i64>,
    pub points_per_loss: Option<i64>,
    pub points_per_draw: Option<i64>,
}

impl UpdateLeagueRequest {
    pub fn apply(self, league: &mut League) {
        if let Some(name) = self.name {
            league.name = name;
        }
        if let Some(description) = self.description {
            league.description = Some(description);
        }
        if let Some(start_date) = self.start_date {
            league.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            league.end_date = end_date;
        }
        if let Some(weekly_budget) = self.weekly_budget {
            league.weekly_budget = weekly_budget;
        }
        if let Some(code) = self.league_code {
            league.league_code = Some(code);
        }
        if let Some(max) = self.max_players {
            league.max_players = Some(max);
        }
        if let Some(points) = self.points_per_win {
            league.points_per_win = points;
        }
        if let Some(points) = self.points_per_loss {
            league.points_per_loss = points;
        }
        if let Some(points) = self.points_per_draw {
            league.points_per_draw = points;
        }
    }
}

/// Where a league stands in its calendar at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueWeek {
    pub current_week: u32,
    pub max_week: u32,
    pub adds_locked: bool,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    /// The next weekly cutoff, if the season has one left.
    pub next_cutoff: Option<DateTime<Utc>>,
}

/// A league with its computed calendar position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueDetails {
    #[serde(flatten)]
    pub league: League,
    pub week: LeagueWeek,
    pub participant_count: i64,
}

/// A user's enrollment in a league (`user_leagues` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub league_id: LeagueId,
    pub league_name: String,
    pub firstname: String,
    pub lastname: String,
    pub league_wins: i64,
    pub league_losses: i64,
    pub league_draws: i64,
    pub total_points: i64,
    pub matches_played: i64,
    pub commander: Option<String>,
    pub decklist_url: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub commander: Option<String>,
    pub decklist_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub firstname: String,
    pub lastname: String,
    pub total_points: i64,
    pub league_wins: i64,
    pub league_losses: i64,
    pub league_draws: i64,
    pub matches_played: i64,
    /// Wins divided by matches played, 0 when nothing was played.
    pub win_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueStats {
    pub league_id: LeagueId,
    pub participants: i64,
    pub open_pods: i64,
    pub active_pods: i64,
    pub pending_pods: i64,
    pub completed_pods: i64,
    pub total_points_awarded: i64,
}

/// Rank enrollments by points, then wins. Ties share a rank.
pub fn rank_leaderboard(mut rows: Vec<Enrollment>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(b.league_wins.cmp(&a.league_wins))
            .then(a.user_id.cmp(&b.user_id))
    });

    let mut entries = Vec::with_capacity(rows.len());
    let mut rank = 0u32;
    let mut previous: Option<(i64, i64)> = None;
    for (index, row) in rows.into_iter().enumerate() {
        let key = (row.total_points, row.league_wins);
        if previous != Some(key) {
            rank = index as u32 + 1;
            previous = Some(key);
        }
        let win_rate = if row.matches_played > 0 {
            row.league_wins as f64 / row.matches_played as f64
        } else {
            0.0
        };
        entries.push(LeaderboardEntry {
            rank,
            user_id: row.user_id,
            firstname: row.firstname,
            lastname: row.lastname,
            total_points: row.total_points,
            league_wins: row.league_wins,
            league_losses: row.league_losses,
            league_draws: row.league_draws,
            matches_played: row.matches_played,
            win_rate,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(user: i64, points: i64, wins: i64, played: i64) -> Enrollment {
        Enrollment {
            user_id: UserId(user),
            league_id: LeagueId(1),
            league_name: "Spring".into(),
            firstname: format!("P{user}"),
            lastname: "Test".into(),
            league_wins: wins,
            league_losses: played - wins,
            league_draws: 0,
            total_points: points,
            matches_played: played,
            commander: None,
            decklist_url: None,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_rank_leaderboard_orders_by_points_then_wins() {
        let ranked = rank_leaderboard(vec![
            enrollment(1, 5, 1, 2),
            enrollment(2, 9, 2, 3),
            enrollment(3, 5, 0, 5),
        ]);
        let order: Vec<i64> = ranked.iter().map(|e| e.user_id.0).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_rank_leaderboard_ties_share_rank() {
        let ranked = rank_leaderboard(vec![
            enrollment(1, 8, 2, 2),
            enrollment(2, 8, 2, 4),
            enrollment(3, 1, 0, 1),
        ]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 1);
        assert_eq!(ranked[2].rank, 3);
        assert_eq!(ranked[1].win_rate, 0.5);
    }

    #[test]
    fn test_update_league_apply() {
        let now = Utc::now();
        let mut league = League {
            id: LeagueId(1),
            name: "Old".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            weekly_budget: Money::from_cents(1000),
            is_active: false,
            league_code: None,
            max_players: None,
            points_per_win: 4,
            points_per_loss: 1,
            points_per_draw: 1,
            created_at: now,
            updated_at: now,
        };
        UpdateLeagueRequest {
            name: Some("New".into()),
            weekly_budget: Some(Money::from_cents(1500)),
            ..Default::default()
        }
        .apply(&mut league);
        assert_eq!(league.name, "New");
        assert_eq!(league.weekly_budget.cents(), 1500);
        assert_eq!(league.points_per_win, 4);
    }
}
