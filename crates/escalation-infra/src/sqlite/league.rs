//! SQLite league and enrollment repository implementation.

use escalation_core::repository::league::LeagueRepository;
use escalation_types::error::RepositoryError;
use escalation_types::league::{
    CreateLeagueRequest, DEFAULT_POINTS_PER_DRAW, DEFAULT_POINTS_PER_LOSS, DEFAULT_POINTS_PER_WIN,
    Enrollment, League, LeagueId, LeagueStats, UpdateEnrollmentRequest,
};
use escalation_types::money::Money;
use escalation_types::user::UserId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_date, is_unique_violation, now, parse_date, parse_datetime, query_err};

const SELECT_LEAGUE: &str = "SELECT id, name, description, start_date, end_date, weekly_budget,
        is_active, league_code, max_players, points_per_win, points_per_loss, points_per_draw,
        created_at, updated_at
 FROM leagues";

const SELECT_ENROLLMENT: &str = "SELECT ul.user_id, ul.league_id, l.name AS league_name,
        u.firstname, u.lastname, ul.league_wins, ul.league_losses, ul.league_draws,
        ul.total_points, ul.matches_played, ul.commander, ul.decklist_url, ul.joined_at
 FROM user_leagues ul
 JOIN leagues l ON l.id = ul.league_id
 JOIN users u ON u.id = ul.user_id";

/// SQLite-backed implementation of `LeagueRepository`.
#[derive(Clone)]
pub struct SqliteLeagueRepository {
    pool: DatabasePool,
}

impl SqliteLeagueRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct LeagueRow {
    id: i64,
    name: String,
    description: Option<String>,
    start_date: String,
    end_date: String,
    weekly_budget: i64,
    is_active: bool,
    league_code: Option<String>,
    max_players: Option<i64>,
    points_per_win: i64,
    points_per_loss: i64,
    points_per_draw: i64,
    created_at: String,
    updated_at: String,
}

impl LeagueRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            weekly_budget: row.try_get("weekly_budget")?,
            is_active: row.try_get("is_active")?,
            league_code: row.try_get("league_code")?,
            max_players: row.try_get("max_players")?,
            points_per_win: row.try_get("points_per_win")?,
            points_per_loss: row.try_get("points_per_loss")?,
            points_per_draw: row.try_get("points_per_draw")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_league(self) -> Result<League, RepositoryError> {
        Ok(League {
            id: LeagueId(self.id),
            name: self.name,
            description: self.description,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            weekly_budget: Money::from_cents(self.weekly_budget),
            is_active: self.is_active,
            league_code: self.league_code,
            max_players: self.max_players,
            points_per_win: self.points_per_win,
            points_per_loss: self.points_per_loss,
            points_per_draw: self.points_per_draw,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_league(row: &sqlx::sqlite::SqliteRow) -> Result<League, RepositoryError> {
    LeagueRow::from_row(row).map_err(query_err)?.into_league()
}

struct EnrollmentRow {
    user_id: i64,
    league_id: i64,
    league_name: String,
    firstname: String,
    lastname: String,
    league_wins: i64,
    league_losses: i64,
    league_draws: i64,
    total_points: i64,
    matches_played: i64,
    commander: Option<String>,
    decklist_url: Option<String>,
    joined_at: String,
}

impl EnrollmentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            league_id: row.try_get("league_id")?,
            league_name: row.try_get("league_name")?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
            league_wins: row.try_get("league_wins")?,
            league_losses: row.try_get("league_losses")?,
            league_draws: row.try_get("league_draws")?,
            total_points: row.try_get("total_points")?,
            matches_played: row.try_get("matches_played")?,
            commander: row.try_get("commander")?,
            decklist_url: row.try_get("decklist_url")?,
            joined_at: row.try_get("joined_at")?,
        })
    }

    fn into_enrollment(self) -> Result<Enrollment, RepositoryError> {
        Ok(Enrollment {
            user_id: UserId(self.user_id),
            league_id: LeagueId(self.league_id),
            league_name: self.league_name,
            firstname: self.firstname,
            lastname: self.lastname,
            league_wins: self.league_wins,
            league_losses: self.league_losses,
            league_draws: self.league_draws,
            total_points: self.total_points,
            matches_played: self.matches_played,
            commander: self.commander,
            decklist_url: self.decklist_url,
            joined_at: parse_datetime(&self.joined_at)?,
        })
    }
}

fn map_enrollment(row: &sqlx::sqlite::SqliteRow) -> Result<Enrollment, RepositoryError> {
    EnrollmentRow::from_row(row).map_err(query_err)?.into_enrollment()
}

impl SqliteLeagueRepository {
    async fn reload(&self, id: LeagueId) -> Result<League, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_LEAGUE} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?
            .ok_or(RepositoryError::NotFound)?;
        map_league(&row)
    }

    async fn reload_enrollment(&self, user_id: UserId, league_id: LeagueId) -> Result<Enrollment, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_ENROLLMENT} WHERE ul.user_id = ? AND ul.league_id = ?"))
            .bind(user_id.get())
            .bind(league_id.get())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_err)?
            .ok_or(RepositoryError::NotFound)?;
        map_enrollment(&row)
    }
}

impl LeagueRepository for SqliteLeagueRepository {
    async fn create(&self, request: &CreateLeagueRequest) -> Result<League, RepositoryError> {
        let ts = now();
        let done = sqlx::query(
            "INSERT INTO leagues (name, description, start_date, end_date, weekly_budget, league_code,
                                  max_players, points_per_win, points_per_loss, points_per_draw,
                                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.name)
        .bind(&request.description)
        .bind(format_date(&request.start_date))
        .bind(format_date(&request.end_date))
        .bind(request.weekly_budget.cents())
        .bind(&request.league_code)
        .bind(request.max_players)
        .bind(request.points_per_win.unwrap_or(DEFAULT_POINTS_PER_WIN))
        .bind(request.points_per_loss.unwrap_or(DEFAULT_POINTS_PER_LOSS))
        .bind(request.points_per_draw.unwrap_or(DEFAULT_POINTS_PER_DRAW))
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        self.reload(LeagueId(done.last_insert_rowid())).await
    }

    async fn get(&self, id: LeagueId) -> Result<Option<League>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_LEAGUE} WHERE id = ?"))
            .bind(id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_league).transpose()
    }

    async fn list(&self) -> Result<Vec<League>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_LEAGUE} ORDER BY start_date DESC, id DESC"))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;
        rows.iter().map(map_league).collect()
    }

    async fn search(&self, term: &str) -> Result<Vec<League>, RepositoryError> {
        let pattern = format!("%{}%", term.to_lowercase());
        let rows = sqlx::query(&format!(
            "{SELECT_LEAGUE}
             WHERE LOWER(name) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?
             ORDER BY start_date DESC, id DESC"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_league).collect()
    }

    async fn get_active(&self) -> Result<Option<League>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_LEAGUE} WHERE is_active = 1"))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_league).transpose()
    }

    async fn set_active(&self, id: LeagueId) -> Result<League, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let ts = now();

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM leagues WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("UPDATE leagues SET is_active = 0, updated_at = ? WHERE is_active = 1 AND id != ?")
            .bind(&ts)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        sqlx::query("UPDATE leagues SET is_active = 1, updated_at = ? WHERE id = ?")
            .bind(&ts)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        self.reload(id).await
    }

    async fn update(&self, league: &League) -> Result<League, RepositoryError> {
        let done = sqlx::query(
            "UPDATE leagues SET name = ?, description = ?, start_date = ?, end_date = ?,
                weekly_budget = ?, league_code = ?, max_players = ?, points_per_win = ?,
                points_per_loss = ?, points_per_draw = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&league.name)
        .bind(&league.description)
        .bind(format_date(&league.start_date))
        .bind(format_date(&league.end_date))
        .bind(league.weekly_budget.cents())
        .bind(&league.league_code)
        .bind(league.max_players)
        .bind(league.points_per_win)
        .bind(league.points_per_loss)
        .bind(league.points_per_draw)
        .bind(now())
        .bind(league.id.get())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.reload(league.id).await
    }

    async fn enroll(&self, user_id: UserId, league_id: LeagueId) -> Result<Enrollment, RepositoryError> {
        let result = sqlx::query("INSERT INTO user_leagues (user_id, league_id, joined_at) VALUES (?, ?, ?)")
            .bind(user_id.get())
            .bind(league_id.get())
            .bind(now())
            .execute(&self.pool.writer)
            .await;

        match result {
            Ok(_) => self.reload_enrollment(user_id, league_id).await,
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "user {user_id} is already enrolled in league {league_id}"
            ))),
            Err(e) => Err(query_err(e)),
        }
    }

    async fn unenroll(&self, user_id: UserId, league_id: LeagueId) -> Result<(), RepositoryError> {
        let done = sqlx::query("DELETE FROM user_leagues WHERE user_id = ? AND league_id = ?")
            .bind(user_id.get())
            .bind(league_id.get())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_ENROLLMENT} WHERE ul.user_id = ? AND ul.league_id = ?"))
            .bind(user_id.get())
            .bind(league_id.get())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;
        row.as_ref().map(map_enrollment).transpose()
    }

    async fn list_enrollments(&self, league_id: LeagueId) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ENROLLMENT} WHERE ul.league_id = ? ORDER BY ul.joined_at, ul.user_id"
        ))
        .bind(league_id.get())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_enrollment).collect()
    }

    async fn list_user_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ENROLLMENT} WHERE ul.user_id = ? ORDER BY l.start_date DESC, ul.league_id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;
        rows.iter().map(map_enrollment).collect()
    }

    async fn update_enrollment(
        &self,
        user_id: UserId,
        league_id: LeagueId,
        update: &UpdateEnrollmentRequest,
    ) -> Result<Enrollment, RepositoryError> {
        let done = sqlx::query(
            "UPDATE user_leagues SET
                commander = COALESCE(?, commander),
                decklist_url = COALESCE(?, decklist_url)
             WHERE user_id = ? AND league_id = ?",
        )
        .bind(update.commander.as_deref())
        .bind(update.decklist_url.as_deref())
        .bind(user_id.get())
        .bind(league_id.get())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.reload_enrollment(user_id, league_id).await
    }

    async fn count_participants(&self, league_id: LeagueId) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_leagues WHERE league_id = ?")
            .bind(league_id.get())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)
    }

    async fn stats(&self, league_id: LeagueId) -> Result<LeagueStats, RepositoryError> {
        let (participants, total_points_awarded): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_points), 0) FROM user_leagues WHERE league_id = ?",
        )
        .bind(league_id.get())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM game_pods
             WHERE league_id = ? AND deleted_at IS NULL
             GROUP BY status",
        )
        .bind(league_id.get())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut stats = LeagueStats {
            league_id,
            participants,
            total_points_awarded,
            open_pods: 0,
            active_pods: 0,
            pending_pods: 0,
            completed_pods: 0,
        };
        for (status, count) in counts {
            match status.as_str() {
                "open" => stats.open_pods = count,
                "active" => stats.active_pods = count,
                "pending" => stats.pending_pods = count,
                "complete" => stats.completed_pods = count,
                other => tracing::warn!(status = other, "unknown pod status in league stats"),
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sqlite::testing::test_pool;
    use crate::sqlite::user::SqliteUserRepository;
    use crate::sqlite::user::tests::insert_user;
    use chrono::NaiveDate;

    pub(crate) fn league_request(name: &str) -> CreateLeagueRequest {
        CreateLeagueRequest {
            name: name.to_string(),
            description: Some(format!("{name} season")),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
            weekly_budget: Money::from_cents(1000),
            league_code: None,
            max_players: None,
            points_per_win: None,
            points_per_loss: None,
            points_per_draw: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_point_defaults() {
        let repo = SqliteLeagueRepository::new(test_pool().await);
        let league = repo.create(&league_request("Spring")).await.unwrap();
        assert_eq!(league.points_per_win, DEFAULT_POINTS_PER_WIN);
        assert_eq!(league.weekly_budget.cents(), 1000);
        assert!(!league.is_active);
        assert_eq!(league.start_date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
    }

    #[tokio::test]
    async fn test_set_active_is_exclusive() {
        let repo = SqliteLeagueRepository::new(test_pool().await);
        let spring = repo.create(&league_request("Spring")).await.unwrap();
        let summer = repo.create(&league_request("Summer")).await.unwrap();

        repo.set_active(spring.id).await.unwrap();
        let active = repo.set_active(summer.id).await.unwrap();
        assert!(active.is_active);

        let current = repo.get_active().await.unwrap().unwrap();
        assert_eq!(current.id, summer.id);
        assert!(!repo.get(spring.id).await.unwrap().unwrap().is_active);

        assert!(matches!(
            repo.set_active(LeagueId(42)).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_search_matches_name_and_description() {
        let repo = SqliteLeagueRepository::new(test_pool().await);
        repo.create(&league_request("Spring")).await.unwrap();
        let mut request = league_request("Draft Night");
        request.description = Some("Cube draft".into());
        repo.create(&request).await.unwrap();

        assert_eq!(repo.search("spring").await.unwrap().len(), 1);
        assert_eq!(repo.search("CUBE").await.unwrap().len(), 1);
        assert_eq!(repo.search("season").await.unwrap().len(), 1);
        assert!(repo.search("winter").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enrollment_lifecycle() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteLeagueRepository::new(pool);
        let league = repo.create(&league_request("Spring")).await.unwrap();
        let ada = insert_user(&users, "ada@example.com", "league_user").await;

        let enrollment = repo.enroll(ada.id, league.id).await.unwrap();
        assert_eq!(enrollment.league_name, "Spring");
        assert_eq!(enrollment.firstname, "ada");
        assert!(matches!(
            repo.enroll(ada.id, league.id).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(repo.count_participants(league.id).await.unwrap(), 1);

        let updated = repo
            .update_enrollment(
                ada.id,
                league.id,
                &UpdateEnrollmentRequest {
                    commander: Some("Atraxa".into()),
                    decklist_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.commander.as_deref(), Some("Atraxa"));

        assert_eq!(repo.list_user_enrollments(ada.id).await.unwrap().len(), 1);
        repo.unenroll(ada.id, league.id).await.unwrap();
        assert!(matches!(
            repo.unenroll(ada.id, league.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(repo.get_enrollment(ada.id, league.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_participants() {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let repo = SqliteLeagueRepository::new(pool);
        let league = repo.create(&league_request("Spring")).await.unwrap();
        for i in 0..3 {
            let user = insert_user(&users, &format!("p{i}@example.com"), "league_user").await;
            repo.enroll(user.id, league.id).await.unwrap();
        }
        let stats = repo.stats(league.id).await.unwrap();
        assert_eq!(stats.participants, 3);
        assert_eq!(stats.open_pods, 0);
        assert_eq!(stats.total_points_awarded, 0);
    }
}
