//! SQLite pod repository implementation.
//!
//! Pods live in `game_pods`, participants in `game_players`. Completing or
//! rewriting a pod touches `user_leagues` and `users` in the same
//! transaction so standings never disagree with pod outcomes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use escalation_core::repository::pod::{PodRepository, PodRewrite, PodVersion};
use escalation_types::error::RepositoryError;
use escalation_types::league::LeagueId;
use escalation_types::pod::{
    GameResult, Pod, PodDetails, PodFilter, PodId, PodParticipant, PodStatus, StatsDelta,
};
use escalation_types::user::UserId;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, now, parse_datetime, query_err};

const SELECT_POD: &str =
    "SELECT id, league_id, creator_id, status, created_at, completed_at FROM game_pods";

const SELECT_PARTICIPANT: &str = "SELECT gp.pod_id, gp.player_id, u.firstname, u.lastname, gp.result,
        gp.confirmed, gp.turn_order, gp.joined_at
 FROM game_players gp
 JOIN users u ON u.id = gp.player_id";

/// SQLite-backed implementation of `PodRepository`.
#[derive(Clone)]
pub struct SqlitePodRepository {
    pool: DatabasePool,
}

impl SqlitePodRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct PodRow {
    id: i64,
    league_id: i64,
    creator_id: i64,
    status: String,
    created_at: String,
    completed_at: Option<String>,
}

impl PodRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            league_id: row.try_get("league_id")?,
            creator_id: row.try_get("creator_id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_pod(self) -> Result<Pod, RepositoryError> {
        Ok(Pod {
            id: PodId(self.id),
            league_id: LeagueId(self.league_id),
            creator_id: UserId(self.creator_id),
            status: self.status.parse().map_err(RepositoryError::Query)?,
            created_at: parse_datetime(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

struct ParticipantRow {
    pod_id: i64,
    player_id: i64,
    firstname: String,
    lastname: String,
    result: Option<String>,
    confirmed: bool,
    turn_order: Option<i64>,
    joined_at: String,
}

impl ParticipantRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pod_id: row.try_get("pod_id")?,
            player_id: row.try_get("player_id")?,
            firstname: row.try_get("firstname")?,
            lastname: row.try_get("lastname")?,
            result: row.try_get("result")?,
            confirmed: row.try_get("confirmed")?,
            turn_order: row.try_get("turn_order")?,
            joined_at: row.try_get("joined_at")?,
        })
    }

    fn into_participant(self) -> Result<(PodId, PodParticipant), RepositoryError> {
        let result = self
            .result
            .as_deref()
            .map(str::parse::<GameResult>)
            .transpose()
            .map_err(RepositoryError::Query)?;
        Ok((
            PodId(self.pod_id),
            PodParticipant {
                user_id: UserId(self.player_id),
                firstname: self.firstname,
                lastname: self.lastname,
                result,
                confirmed: self.confirmed,
                turn_order: self.turn_order,
                joined_at: parse_datetime(&self.joined_at)?,
            },
        ))
    }
}

/// Load pods and their participants over one connection.
async fn load_details(
    conn: &mut SqliteConnection,
    pods: Vec<Pod>,
) -> Result<Vec<PodDetails>, RepositoryError> {
    if pods.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT_PARTICIPANT);
    qb.push(" WHERE gp.pod_id IN (");
    let mut ids = qb.separated(", ");
    for pod in &pods {
        ids.push_bind(pod.id.get());
    }
    qb.push(") ORDER BY gp.pod_id, COALESCE(gp.turn_order, 2147483647), gp.joined_at, gp.player_id");

    let rows = qb.build().fetch_all(&mut *conn).await.map_err(query_err)?;
    let mut by_pod: HashMap<PodId, Vec<PodParticipant>> = HashMap::new();
    for row in &rows {
        let (pod_id, participant) = ParticipantRow::from_row(row)
            .map_err(query_err)?
            .into_participant()?;
        by_pod.entry(pod_id).or_default().push(participant);
    }

    Ok(pods
        .into_iter()
        .map(|pod| PodDetails {
            participants: by_pod.remove(&pod.id).unwrap_or_default(),
            pod,
        })
        .collect())
}

async fn fetch_details(conn: &mut SqliteConnection, id: PodId) -> Result<Option<PodDetails>, RepositoryError> {
    let row = sqlx::query(&format!("{SELECT_POD} WHERE id = ? AND deleted_at IS NULL"))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;
    let Some(row) = row else {
        return Ok(None);
    };
    let pod = PodRow::from_row(&row).map_err(query_err)?.into_pod()?;
    Ok(load_details(conn, vec![pod]).await?.pop())
}

async fn require_details(conn: &mut SqliteConnection, id: PodId) -> Result<PodDetails, RepositoryError> {
    fetch_details(conn, id).await?.ok_or(RepositoryError::NotFound)
}

/// Add each delta to the league standing and the lifetime record.
async fn apply_deltas(
    conn: &mut SqliteConnection,
    league_id: LeagueId,
    deltas: &[StatsDelta],
) -> Result<(), RepositoryError> {
    for delta in deltas {
        sqlx::query(
            "UPDATE user_leagues SET
                league_wins = league_wins + ?,
                league_losses = league_losses + ?,
                league_draws = league_draws + ?,
                total_points = total_points + ?,
                matches_played = matches_played + ?
             WHERE user_id = ? AND league_id = ?",
        )
        .bind(delta.wins)
        .bind(delta.losses)
        .bind(delta.draws)
        .bind(delta.points)
        .bind(delta.matches())
        .bind(delta.user_id.get())
        .bind(league_id.get())
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

        sqlx::query(
            "UPDATE users SET wins = wins + ?, losses = losses + ?, draws = draws + ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(delta.wins)
        .bind(delta.losses)
        .bind(delta.draws)
        .bind(now())
        .bind(delta.user_id.get())
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;
    }
    Ok(())
}

async fn ensure_live(conn: &mut SqliteConnection, pod_id: PodId) -> Result<(), RepositoryError> {
    let live: Option<(i64,)> = sqlx::query_as("SELECT id FROM game_pods WHERE id = ? AND deleted_at IS NULL")
        .bind(pod_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(query_err)?;
    live.map(|_| ()).ok_or(RepositoryError::NotFound)
}

/// Refuse to write over a pod that changed after the caller read it.
async fn ensure_version(
    conn: &mut SqliteConnection,
    pod_id: PodId,
    expected: &PodVersion,
) -> Result<(), RepositoryError> {
    let current = require_details(conn, pod_id).await?;
    if PodVersion::of(&current) != *expected {
        return Err(RepositoryError::Conflict(format!(
            "pod {pod_id} changed since it was read"
        )));
    }
    Ok(())
}

impl PodRepository for SqlitePodRepository {
    async fn create(&self, league_id: LeagueId, creator_id: UserId) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let ts = now();

        let done = sqlx::query(
            "INSERT INTO game_pods (league_id, creator_id, status, created_at) VALUES (?, ?, 'open', ?)",
        )
        .bind(league_id.get())
        .bind(creator_id.get())
        .bind(&ts)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        let pod_id = PodId(done.last_insert_rowid());

        sqlx::query("INSERT INTO game_players (pod_id, player_id, turn_order, joined_at) VALUES (?, ?, 1, ?)")
            .bind(pod_id.get())
            .bind(creator_id.get())
            .bind(&ts)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn get(&self, id: PodId) -> Result<Option<PodDetails>, RepositoryError> {
        let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
        fetch_details(&mut conn, id).await
    }

    async fn list(&self, filter: &PodFilter) -> Result<Vec<PodDetails>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_POD);
        qb.push(" WHERE deleted_at IS NULL");
        if let Some(league_id) = filter.league_id {
            qb.push(" AND league_id = ").push_bind(league_id.get());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(player_id) = filter.player_id {
            qb.push(" AND id IN (SELECT pod_id FROM game_players WHERE player_id = ")
                .push_bind(player_id.get())
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(-1))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0));

        let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
        let rows = qb.build().fetch_all(&mut *conn).await.map_err(query_err)?;
        let pods = rows
            .iter()
            .map(|row| PodRow::from_row(row).map_err(query_err)?.into_pod())
            .collect::<Result<Vec<_>, _>>()?;
        load_details(&mut conn, pods).await
    }

    async fn add_participant(
        &self,
        pod_id: PodId,
        user_id: UserId,
        status: PodStatus,
    ) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_live(&mut tx, pod_id).await?;

        let inserted = sqlx::query(
            "INSERT INTO game_players (pod_id, player_id, turn_order, joined_at)
             VALUES (?, ?, (SELECT COALESCE(MAX(turn_order), 0) + 1 FROM game_players WHERE pod_id = ?), ?)",
        )
        .bind(pod_id.get())
        .bind(user_id.get())
        .bind(pod_id.get())
        .bind(now())
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(RepositoryError::Conflict(format!("user {user_id} already in pod {pod_id}")));
            }
            Err(e) => return Err(query_err(e)),
        }

        sqlx::query("UPDATE game_pods SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn declare_result(
        &self,
        pod_id: PodId,
        results: &[(UserId, GameResult)],
        declared_by: UserId,
        at: DateTime<Utc>,
    ) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_live(&mut tx, pod_id).await?;

        sqlx::query("UPDATE game_players SET confirmed = 0, confirmation_time = NULL WHERE pod_id = ?")
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        for (user_id, result) in results {
            sqlx::query("UPDATE game_players SET result = ? WHERE pod_id = ? AND player_id = ?")
                .bind(result.to_string())
                .bind(pod_id.get())
                .bind(user_id.get())
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        sqlx::query("UPDATE game_players SET confirmed = 1, confirmation_time = ? WHERE pod_id = ? AND player_id = ?")
            .bind(format_datetime(&at))
            .bind(pod_id.get())
            .bind(declared_by.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        sqlx::query("UPDATE game_pods SET status = 'pending' WHERE id = ?")
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn confirm(&self, pod_id: PodId, user_id: UserId, at: DateTime<Utc>) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_live(&mut tx, pod_id).await?;

        let done = sqlx::query(
            "UPDATE game_players SET confirmed = 1, confirmation_time = ? WHERE pod_id = ? AND player_id = ?",
        )
        .bind(format_datetime(&at))
        .bind(pod_id.get())
        .bind(user_id.get())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn complete(
        &self,
        pod_id: PodId,
        league_id: LeagueId,
        deltas: &[StatsDelta],
        at: DateTime<Utc>,
    ) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        // Guarded on status so a racing confirmation cannot apply stats twice.
        let done = sqlx::query(
            "UPDATE game_pods SET status = 'complete', completed_at = ?
             WHERE id = ? AND deleted_at IS NULL AND status != 'complete'",
        )
        .bind(format_datetime(&at))
        .bind(pod_id.get())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!("pod {pod_id} is not completable")));
        }

        apply_deltas(&mut tx, league_id, deltas).await?;

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn rewrite(&self, pod_id: PodId, league_id: LeagueId, rewrite: &PodRewrite) -> Result<PodDetails, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_version(&mut tx, pod_id, &rewrite.expected).await?;
        let ts = now();

        apply_deltas(&mut tx, league_id, &rewrite.reverse).await?;

        // Keep original join times for players who stay in the pod.
        let joined: Vec<(i64, String)> =
            sqlx::query_as("SELECT player_id, joined_at FROM game_players WHERE pod_id = ?")
                .bind(pod_id.get())
                .fetch_all(&mut *tx)
                .await
                .map_err(query_err)?;
        let joined: HashMap<i64, String> = joined.into_iter().collect();

        sqlx::query("DELETE FROM game_players WHERE pod_id = ?")
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        for participant in &rewrite.participants {
            let user = participant.user_id.get();
            sqlx::query(
                "INSERT INTO game_players (pod_id, player_id, result, confirmed, confirmation_time, turn_order, joined_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(pod_id.get())
            .bind(user)
            .bind(participant.result.map(|r| r.to_string()))
            .bind(participant.confirmed)
            .bind(participant.confirmed.then(|| ts.clone()))
            .bind(participant.turn_order)
            .bind(joined.get(&user).cloned().unwrap_or_else(|| ts.clone()))
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        }

        sqlx::query("UPDATE game_pods SET status = ?, completed_at = ? WHERE id = ?")
            .bind(rewrite.status.to_string())
            .bind(rewrite.completed_at.as_ref().map(format_datetime))
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        apply_deltas(&mut tx, league_id, &rewrite.apply).await?;

        let details = require_details(&mut tx, pod_id).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(details)
    }

    async fn soft_delete(
        &self,
        pod_id: PodId,
        league_id: LeagueId,
        expected: &PodVersion,
        reverse: &[StatsDelta],
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_version(&mut tx, pod_id, expected).await?;

        let done = sqlx::query("UPDATE game_pods SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(format_datetime(&at))
            .bind(pod_id.get())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        apply_deltas(&mut tx, league_id, reverse).await?;
        tx.commit().await.map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::league::SqliteLeagueRepository;
    use crate::sqlite::league::tests::league_request;
    use crate::sqlite::testing::test_pool;
    use crate::sqlite::user::SqliteUserRepository;
    use crate::sqlite::user::tests::insert_user;
    use escalation_core::repository::league::LeagueRepository;
    use escalation_core::repository::user::UserRepository;
    use escalation_types::pod::ParticipantUpdate;

    struct Fixture {
        pods: SqlitePodRepository,
        leagues: SqliteLeagueRepository,
        users: SqliteUserRepository,
        league_id: LeagueId,
        players: Vec<UserId>,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let users = SqliteUserRepository::new(pool.clone());
        let leagues = SqliteLeagueRepository::new(pool.clone());
        let league = leagues.create(&league_request("Spring")).await.unwrap();
        let mut players = Vec::new();
        for i in 0..4 {
            let user = insert_user(&users, &format!("p{i}@example.com"), "league_user").await;
            leagues.enroll(user.id, league.id).await.unwrap();
            players.push(user.id);
        }
        Fixture {
            pods: SqlitePodRepository::new(pool),
            leagues,
            users,
            league_id: league.id,
            players,
        }
    }

    fn win_delta(user: UserId) -> StatsDelta {
        StatsDelta {
            user_id: user,
            wins: 1,
            losses: 0,
            draws: 0,
            points: 4,
        }
    }

    #[tokio::test]
    async fn test_create_and_join_assigns_turn_order() {
        let f = fixture().await;
        let pod = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        assert_eq!(pod.pod.status, PodStatus::Open);
        assert_eq!(pod.participants.len(), 1);
        assert_eq!(pod.participants[0].turn_order, Some(1));

        let pod = f
            .pods
            .add_participant(pod.pod.id, f.players[1], PodStatus::Open)
            .await
            .unwrap();
        assert_eq!(pod.participants[1].user_id, f.players[1]);
        assert_eq!(pod.participants[1].turn_order, Some(2));

        let err = f
            .pods
            .add_participant(pod.pod.id, f.players[1], PodStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_player_and_status() {
        let f = fixture().await;
        let first = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        f.pods.create(f.league_id, f.players[1]).await.unwrap();
        f.pods
            .add_participant(first.pod.id, f.players[2], PodStatus::Active)
            .await
            .unwrap();

        let all = f
            .pods
            .list(&PodFilter {
                league_id: Some(f.league_id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let mine = f
            .pods
            .list(&PodFilter {
                player_id: Some(f.players[2]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].participants.len(), 2);

        let open = f
            .pods
            .list(&PodFilter {
                status: Some(PodStatus::Open),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);

        let paged = f
            .pods
            .list(&PodFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[tokio::test]
    async fn test_declare_confirm_complete_applies_stats() {
        let f = fixture().await;
        let pod = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        let id = pod.pod.id;
        f.pods.add_participant(id, f.players[1], PodStatus::Active).await.unwrap();

        let at = Utc::now();
        let pod = f
            .pods
            .declare_result(
                id,
                &[(f.players[0], GameResult::Win), (f.players[1], GameResult::Loss)],
                f.players[0],
                at,
            )
            .await
            .unwrap();
        assert_eq!(pod.pod.status, PodStatus::Pending);
        assert!(pod.participant(f.players[0]).unwrap().confirmed);
        assert!(!pod.participant(f.players[1]).unwrap().confirmed);

        let pod = f.pods.confirm(id, f.players[1], at).await.unwrap();
        assert!(pod.all_confirmed());

        let loss = StatsDelta {
            user_id: f.players[1],
            wins: 0,
            losses: 1,
            draws: 0,
            points: 1,
        };
        let pod = f
            .pods
            .complete(id, f.league_id, &[win_delta(f.players[0]), loss], at)
            .await
            .unwrap();
        assert_eq!(pod.pod.status, PodStatus::Complete);
        assert!(pod.pod.completed_at.is_some());

        let winner = f.leagues.get_enrollment(f.players[0], f.league_id).await.unwrap().unwrap();
        assert_eq!((winner.league_wins, winner.total_points, winner.matches_played), (1, 4, 1));
        let loser = f.leagues.get_enrollment(f.players[1], f.league_id).await.unwrap().unwrap();
        assert_eq!((loser.league_losses, loser.total_points), (1, 1));
        let lifetime = f.users.get_by_id(f.players[0]).await.unwrap().unwrap();
        assert_eq!(lifetime.wins, 1);

        // a second completion is refused
        let err = f.pods.complete(id, f.league_id, &[win_delta(f.players[0])], at).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rewrite_reverses_previous_outcome() {
        let f = fixture().await;
        let pod = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        let id = pod.pod.id;
        f.pods.add_participant(id, f.players[1], PodStatus::Active).await.unwrap();
        let completed = f
            .pods
            .complete(id, f.league_id, &[win_delta(f.players[0])], Utc::now())
            .await
            .unwrap();

        let rewrite = PodRewrite {
            expected: PodVersion::of(&completed),
            reverse: vec![win_delta(f.players[0]).reversed()],
            participants: vec![
                ParticipantUpdate {
                    user_id: f.players[0],
                    result: Some(GameResult::Loss),
                    confirmed: true,
                    turn_order: Some(1),
                },
                ParticipantUpdate {
                    user_id: f.players[1],
                    result: Some(GameResult::Win),
                    confirmed: true,
                    turn_order: Some(2),
                },
            ],
            status: PodStatus::Complete,
            completed_at: Some(Utc::now()),
            apply: vec![win_delta(f.players[1])],
        };
        let pod = f.pods.rewrite(id, f.league_id, &rewrite).await.unwrap();
        assert_eq!(pod.participant(f.players[1]).unwrap().result, Some(GameResult::Win));

        let first = f.leagues.get_enrollment(f.players[0], f.league_id).await.unwrap().unwrap();
        assert_eq!((first.league_wins, first.total_points, first.matches_played), (0, 0, 0));
        let second = f.leagues.get_enrollment(f.players[1], f.league_id).await.unwrap().unwrap();
        assert_eq!((second.league_wins, second.total_points), (1, 4));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_pod_and_reverses() {
        let f = fixture().await;
        let pod = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        let id = pod.pod.id;
        let completed = f
            .pods
            .complete(id, f.league_id, &[win_delta(f.players[0])], Utc::now())
            .await
            .unwrap();
        let version = PodVersion::of(&completed);

        f.pods
            .soft_delete(id, f.league_id, &version, &[win_delta(f.players[0]).reversed()], Utc::now())
            .await
            .unwrap();
        assert!(f.pods.get(id).await.unwrap().is_none());
        assert!(f.pods.list(&PodFilter::default()).await.unwrap().is_empty());

        let standing = f.leagues.get_enrollment(f.players[0], f.league_id).await.unwrap().unwrap();
        assert_eq!(standing.total_points, 0);
        assert!(matches!(
            f.pods.soft_delete(id, f.league_id, &version, &[], Utc::now()).await,
            Err(RepositoryError::NotFound)
        ));
    }

    fn player(user_id: UserId, result: GameResult, turn_order: i64) -> ParticipantUpdate {
        ParticipantUpdate {
            user_id,
            result: Some(result),
            confirmed: true,
            turn_order: Some(turn_order),
        }
    }

    #[tokio::test]
    async fn test_stale_rewrite_is_refused_without_touching_stats() {
        let f = fixture().await;
        let pod = f.pods.create(f.league_id, f.players[0]).await.unwrap();
        let id = pod.pod.id;
        f.pods.add_participant(id, f.players[1], PodStatus::Active).await.unwrap();
        let at = Utc::now();
        f.pods
            .declare_result(id, &[(f.players[0], GameResult::Win), (f.players[1], GameResult::Loss)], f.players[0], at)
            .await
            .unwrap();
        let completed = f
            .pods
            .complete(id, f.league_id, &[win_delta(f.players[0])], at)
            .await
            .unwrap();
        let read = PodVersion::of(&completed);

        // Two overrides computed from the same read: player 1 wins instead.
        let flip = PodRewrite {
            expected: read.clone(),
            reverse: vec![win_delta(f.players[0]).reversed()],
            participants: vec![
                player(f.players[0], GameResult::Loss, 1),
                player(f.players[1], GameResult::Win, 2),
            ],
            status: PodStatus::Complete,
            completed_at: Some(at),
            apply: vec![win_delta(f.players[1])],
        };
        f.pods.rewrite(id, f.league_id, &flip).await.unwrap();
        let err = f.pods.rewrite(id, f.league_id, &flip).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        let err = f
            .pods
            .soft_delete(id, f.league_id, &read, &[win_delta(f.players[0]).reversed()], at)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // Only the first override landed; nothing was reversed twice.
        let first = f.leagues.get_enrollment(f.players[0], f.league_id).await.unwrap().unwrap();
        assert_eq!((first.league_wins, first.total_points), (0, 0));
        let second = f.leagues.get_enrollment(f.players[1], f.league_id).await.unwrap().unwrap();
        assert_eq!((second.league_wins, second.total_points), (1, 4));
        assert!(f.pods.get(id).await.unwrap().is_some());
    }
}
