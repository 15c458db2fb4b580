//! Pod lifecycle: open -> active -> pending -> complete.
//!
//! Stats are applied once, when the last participant confirms. Admin
//! overrides reverse whatever a complete pod applied before writing the new
//! outcome, so league standings always equal the sum of complete pods.

use std::collections::HashSet;

use escalation_types::activity::{NewActivity, actions};
use escalation_types::error::{PodError, RepositoryError};
use escalation_types::league::{League, LeagueId};
use escalation_types::notification::templates;
use escalation_types::pod::{
    AdminUpdatePodRequest, DeclareResultRequest, GameResult, MAX_POD_SIZE, ParticipantUpdate,
    PodDetails, PodFilter, PodId, PodStatus, StatsDelta,
};
use escalation_types::user::UserId;
use serde_json::json;

use crate::repository::activity::ActivityLogRepository;
use crate::repository::league::LeagueRepository;
use crate::repository::notification::NotificationRepository;
use crate::repository::pod::{PodRepository, PodRewrite, PodVersion};
use crate::service::activity::ActivityService;
use crate::service::notification::NotificationService;
use crate::service::{Clock, system_clock};

pub const DEFAULT_POD_PAGE: i64 = 20;
pub const MAX_POD_PAGE: i64 = 100;

fn storage(e: RepositoryError) -> PodError {
    PodError::StorageError(e.to_string())
}

fn write_error(e: RepositoryError) -> PodError {
    match e {
        RepositoryError::NotFound => PodError::NotFound,
        RepositoryError::Conflict(_) => PodError::Changed,
        other => storage(other),
    }
}

/// Points awarded per outcome in a league.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsTable {
    pub win: i64,
    pub loss: i64,
    pub draw: i64,
}

impl From<&League> for PointsTable {
    fn from(league: &League) -> Self {
        Self {
            win: league.points_per_win,
            loss: league.points_per_loss,
            draw: league.points_per_draw,
        }
    }
}

/// Record changes produced by a set of results.
///
/// Missing and disqualified results produce nothing.
pub fn stats_deltas<I>(results: I, points: PointsTable) -> Vec<StatsDelta>
where
    I: IntoIterator<Item = (UserId, Option<GameResult>)>,
{
    results
        .into_iter()
        .filter_map(|(user_id, result)| {
            let (wins, losses, draws, awarded) = match result? {
                GameResult::Win => (1, 0, 0, points.win),
                GameResult::Loss => (0, 1, 0, points.loss),
                GameResult::Draw => (0, 0, 1, points.draw),
                GameResult::Disqualified => return None,
            };
            Some(StatsDelta {
                user_id,
                wins,
                losses,
                draws,
                points: awarded,
            })
        })
        .collect()
}

/// Deltas a pod in its current state has applied to standings.
fn applied_deltas(pod: &PodDetails, points: PointsTable) -> Vec<StatsDelta> {
    if pod.pod.status != PodStatus::Complete {
        return Vec::new();
    }
    stats_deltas(pod.participants.iter().map(|p| (p.user_id, p.result)), points)
}

/// Results for a declaration: one winner and losses, or a draw for everyone.
fn declared_results(
    pod: &PodDetails,
    request: &DeclareResultRequest,
) -> Result<Vec<(UserId, GameResult)>, PodError> {
    match (request.winner_id, request.draw) {
        (Some(_), true) => Err(PodError::Validation(
            "declare either a winner or a draw, not both".to_string(),
        )),
        (None, false) => Err(PodError::Validation(
            "winner_id is required unless the game was a draw".to_string(),
        )),
        (None, true) => Ok(pod
            .participants
            .iter()
            .map(|p| (p.user_id, GameResult::Draw))
            .collect()),
        (Some(winner), false) => {
            if pod.participant(winner).is_none() {
                return Err(PodError::Validation(
                    "winner must be a participant in this pod".to_string(),
                ));
            }
            Ok(pod
                .participants
                .iter()
                .map(|p| {
                    let result = if p.user_id == winner {
                        GameResult::Win
                    } else {
                        GameResult::Loss
                    };
                    (p.user_id, result)
                })
                .collect())
        }
    }
}

/// Normalize an admin participant list for `status`.
///
/// Completing a pod fills missing results with losses and confirms everyone.
fn prepare_participants(
    mut participants: Vec<ParticipantUpdate>,
    status: PodStatus,
) -> Result<Vec<ParticipantUpdate>, PodError> {
    if participants.len() > MAX_POD_SIZE {
        return Err(PodError::Validation(format!(
            "a pod has at most {MAX_POD_SIZE} participants"
        )));
    }
    let mut seen = HashSet::new();
    if !participants.iter().all(|p| seen.insert(p.user_id)) {
        return Err(PodError::Validation(
            "participants must be unique".to_string(),
        ));
    }
    if status == PodStatus::Complete {
        if participants.is_empty() {
            return Err(PodError::Validation(
                "a complete pod needs participants".to_string(),
            ));
        }
        for p in &mut participants {
            p.result.get_or_insert(GameResult::Loss);
            p.confirmed = true;
        }
    }
    Ok(participants)
}

fn current_participants(pod: &PodDetails) -> Vec<ParticipantUpdate> {
    pod.participants
        .iter()
        .map(|p| ParticipantUpdate {
            user_id: p.user_id,
            result: p.result,
            confirmed: p.confirmed,
            turn_order: p.turn_order,
        })
        .collect()
}

fn expect_status(pod: &PodDetails, expected: PodStatus) -> Result<(), PodError> {
    if pod.pod.status != expected {
        return Err(PodError::InvalidState {
            expected,
            actual: pod.pod.status,
        });
    }
    Ok(())
}

pub struct PodService<P, L, N, A>
where
    P: PodRepository,
    L: LeagueRepository,
    N: NotificationRepository,
    A: ActivityLogRepository,
{
    repo: P,
    leagues: L,
    notifications: NotificationService<N>,
    activity: ActivityService<A>,
    clock: Clock,
}

impl<P, L, N, A> PodService<P, L, N, A>
where
    P: PodRepository,
    L: LeagueRepository,
    N: NotificationRepository,
    A: ActivityLogRepository,
{
    pub fn new(
        repo: P,
        leagues: L,
        notifications: NotificationService<N>,
        activity: ActivityService<A>,
    ) -> Self {
        Self {
            repo,
            leagues,
            notifications,
            activity,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn league(&self, id: LeagueId) -> Result<League, PodError> {
        self.leagues
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(PodError::LeagueNotFound)
    }

    async fn ensure_enrolled(&self, user_id: UserId, league_id: LeagueId) -> Result<(), PodError> {
        self.leagues
            .get_enrollment(user_id, league_id)
            .await
            .map_err(storage)?
            .map(|_| ())
            .ok_or(PodError::NotEnrolled)
    }

    pub async fn get_pod(&self, id: PodId) -> Result<PodDetails, PodError> {
        self.repo
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(PodError::NotFound)
    }

    pub async fn list_pods(&self, mut filter: PodFilter) -> Result<Vec<PodDetails>, PodError> {
        filter.limit = Some(filter.limit.unwrap_or(DEFAULT_POD_PAGE).clamp(1, MAX_POD_PAGE));
        filter.offset = Some(filter.offset.unwrap_or(0).max(0));
        self.repo.list(&filter).await.map_err(storage)
    }

    /// Open a pod in a league; the creator joins it.
    pub async fn create_pod(&self, user_id: UserId, league_id: LeagueId) -> Result<PodDetails, PodError> {
        self.league(league_id).await?;
        self.ensure_enrolled(user_id, league_id).await?;

        let pod = self.repo.create(league_id, user_id).await.map_err(storage)?;
        tracing::info!(pod_id = %pod.pod.id, league_id = %league_id, "pod created");
        self.activity
            .log(NewActivity::new(user_id, actions::GAME_CREATED).with_metadata(json!({
                "pod_id": pod.pod.id,
                "league_id": league_id,
            })))
            .await;
        Ok(pod)
    }

    /// Join an open pod. The fourth player makes it active.
    pub async fn join_pod(&self, user_id: UserId, pod_id: PodId) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        if pod.participant(user_id).is_some() {
            return Err(PodError::AlreadyJoined);
        }
        expect_status(&pod, PodStatus::Open)?;
        if pod.is_full() {
            return Err(PodError::PodFull);
        }
        self.ensure_enrolled(user_id, pod.pod.league_id).await?;

        let status = if pod.participants.len() + 1 >= MAX_POD_SIZE {
            PodStatus::Active
        } else {
            PodStatus::Open
        };
        let pod = self
            .repo
            .add_participant(pod_id, user_id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => PodError::AlreadyJoined,
                other => storage(other),
            })?;

        if pod.pod.status == PodStatus::Active {
            let players: Vec<UserId> = pod.participants.iter().map(|p| p.user_id).collect();
            self.notifications
                .notify_many(&players, &templates::pod_assigned(pod_id))
                .await;
        }
        self.activity
            .log(NewActivity::new(user_id, actions::GAME_JOINED).with_metadata(json!({ "pod_id": pod_id })))
            .await;
        Ok(pod)
    }

    /// Declare the outcome of an active pod. The declarer's confirmation is implied.
    pub async fn declare_result(
        &self,
        user_id: UserId,
        pod_id: PodId,
        request: DeclareResultRequest,
    ) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        if pod.participant(user_id).is_none() {
            return Err(PodError::NotParticipant);
        }
        expect_status(&pod, PodStatus::Active)?;
        let results = declared_results(&pod, &request)?;

        let pod = self
            .repo
            .declare_result(pod_id, &results, user_id, (self.clock)())
            .await
            .map_err(storage)?;

        let others: Vec<UserId> = pod
            .participants
            .iter()
            .map(|p| p.user_id)
            .filter(|id| *id != user_id)
            .collect();
        self.notifications
            .notify_many(&others, &templates::confirm_game(pod_id))
            .await;
        self.activity
            .log(NewActivity::new(user_id, actions::RESULT_DECLARED).with_metadata(json!({
                "pod_id": pod_id,
                "winner_id": request.winner_id,
                "draw": request.draw,
            })))
            .await;

        // A declaration by the only remaining unconfirmed player settles the pod.
        if pod.all_confirmed() {
            return self.finish(pod).await;
        }
        Ok(pod)
    }

    /// Confirm the declared result. The last confirmation completes the pod.
    pub async fn confirm_result(&self, user_id: UserId, pod_id: PodId) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        let participant = pod.participant(user_id).ok_or(PodError::NotParticipant)?;
        expect_status(&pod, PodStatus::Pending)?;
        if participant.confirmed {
            return Err(PodError::AlreadyConfirmed);
        }

        let pod = self
            .repo
            .confirm(pod_id, user_id, (self.clock)())
            .await
            .map_err(storage)?;
        self.activity
            .log(NewActivity::new(user_id, actions::RESULT_CONFIRMED).with_metadata(json!({ "pod_id": pod_id })))
            .await;

        if pod.all_confirmed() {
            return self.finish(pod).await;
        }
        Ok(pod)
    }

    async fn finish(&self, pod: PodDetails) -> Result<PodDetails, PodError> {
        let league = self.league(pod.pod.league_id).await?;
        let deltas = stats_deltas(
            pod.participants.iter().map(|p| (p.user_id, p.result)),
            PointsTable::from(&league),
        );
        let pod_id = pod.pod.id;
        let pod = match self.repo.complete(pod_id, league.id, &deltas, (self.clock)()).await {
            Ok(pod) => pod,
            // Another confirmation completed it first; that request applied the stats.
            Err(RepositoryError::Conflict(_)) => {
                let pod = self.get_pod(pod_id).await?;
                return match pod.pod.status {
                    PodStatus::Complete => Ok(pod),
                    _ => Err(PodError::Changed),
                };
            }
            Err(e) => return Err(storage(e)),
        };

        tracing::info!(pod_id = %pod.pod.id, "pod complete");
        let players: Vec<UserId> = pod.participants.iter().map(|p| p.user_id).collect();
        self.notifications
            .notify_many(&players, &templates::game_complete(pod.pod.id))
            .await;
        self.activity
            .log(NewActivity {
                user_id: None,
                action: actions::GAME_COMPLETED.to_string(),
                metadata: Some(json!({ "pod_id": pod.pod.id, "league_id": league.id })),
            })
            .await;
        Ok(pod)
    }

    /// Replace participants and status, reversing and reapplying stats.
    async fn rewrite(
        &self,
        actor: UserId,
        pod: PodDetails,
        participants: Vec<ParticipantUpdate>,
        status: PodStatus,
        change: serde_json::Value,
    ) -> Result<PodDetails, PodError> {
        let league = self.league(pod.pod.league_id).await?;
        let points = PointsTable::from(&league);
        let participants = prepare_participants(participants, status)?;

        let (apply, completed_at) = if status == PodStatus::Complete {
            let apply = stats_deltas(participants.iter().map(|p| (p.user_id, p.result)), points);
            (apply, Some(pod.pod.completed_at.unwrap_or_else(|| (self.clock)())))
        } else {
            (Vec::new(), None)
        };
        let rewrite = PodRewrite {
            expected: PodVersion::of(&pod),
            reverse: applied_deltas(&pod, points),
            participants,
            status,
            completed_at,
            apply,
        };

        let updated = self
            .repo
            .rewrite(pod.pod.id, league.id, &rewrite)
            .await
            .map_err(write_error)?;

        tracing::info!(pod_id = %pod.pod.id, from = %pod.pod.status, to = %status, "pod overridden");
        self.activity
            .log(NewActivity::new(actor, actions::POD_UPDATED).with_metadata(json!({
                "pod_id": pod.pod.id,
                "previous_status": pod.pod.status,
                "status": status,
                "change": change,
            })))
            .await;
        Ok(updated)
    }

    /// Admin override of participants and/or status.
    pub async fn admin_update(
        &self,
        actor: UserId,
        pod_id: PodId,
        request: AdminUpdatePodRequest,
    ) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        let status = request.status.unwrap_or(pod.pod.status);
        let participants = match request.participants {
            Some(participants) => {
                for p in &participants {
                    self.ensure_enrolled(p.user_id, pod.pod.league_id).await?;
                }
                participants
            }
            None => current_participants(&pod),
        };
        let change = json!({ "participants_replaced": participants.len(), "status": status });
        self.rewrite(actor, pod, participants, status, change).await
    }

    /// Drop a participant. A full pod that loses a player reopens.
    pub async fn remove_participant(
        &self,
        actor: UserId,
        pod_id: PodId,
        user_id: UserId,
    ) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        if pod.participant(user_id).is_none() {
            return Err(PodError::NotParticipant);
        }
        let participants: Vec<ParticipantUpdate> = current_participants(&pod)
            .into_iter()
            .filter(|p| p.user_id != user_id)
            .collect();
        let status = match pod.pod.status {
            PodStatus::Active => PodStatus::Open,
            other => other,
        };
        let change = json!({ "removed_user_id": user_id });
        self.rewrite(actor, pod, participants, status, change).await
    }

    /// Set one participant's result without touching the others.
    pub async fn set_participant_result(
        &self,
        actor: UserId,
        pod_id: PodId,
        user_id: UserId,
        result: GameResult,
    ) -> Result<PodDetails, PodError> {
        let pod = self.get_pod(pod_id).await?;
        if pod.participant(user_id).is_none() {
            return Err(PodError::NotParticipant);
        }
        let participants = current_participants(&pod)
            .into_iter()
            .map(|mut p| {
                if p.user_id == user_id {
                    p.result = Some(result);
                }
                p
            })
            .collect();
        let status = pod.pod.status;
        let change = json!({ "user_id": user_id, "result": result });
        self.rewrite(actor, pod, participants, status, change).await
    }

    /// Soft-delete a pod, reversing the stats of a complete one.
    pub async fn delete_pod(&self, actor: UserId, pod_id: PodId) -> Result<(), PodError> {
        let pod = self.get_pod(pod_id).await?;
        let league = self.league(pod.pod.league_id).await?;
        let reverse = applied_deltas(&pod, PointsTable::from(&league));
        self.repo
            .soft_delete(pod_id, league.id, &PodVersion::of(&pod), &reverse, (self.clock)())
            .await
            .map_err(write_error)?;
        tracing::info!(pod_id = %pod_id, reversed = reverse.len(), "pod deleted");
        self.activity
            .log(NewActivity::new(actor, actions::POD_DELETED).with_metadata(json!({
                "pod_id": pod_id,
                "status": pod.pod.status,
            })))
            .await;
        Ok(())
    }
}
