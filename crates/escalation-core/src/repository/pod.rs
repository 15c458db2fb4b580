//! Pod repository trait definition.

use chrono::{DateTime, Utc};
use escalation_types::error::RepositoryError;
use escalation_types::league::LeagueId;
use escalation_types::pod::{
    GameResult, ParticipantUpdate, PodDetails, PodFilter, PodId, PodStatus, StatsDelta,
};
use escalation_types::user::UserId;

/// The parts of a pod that decide which stats it has applied.
///
/// Rewrites and deletes carry the version their reverse deltas were computed
/// from; storage refuses them with a conflict if the pod moved on since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodVersion {
    pub status: PodStatus,
    pub results: Vec<(UserId, Option<GameResult>)>,
}

impl PodVersion {
    pub fn of(details: &PodDetails) -> Self {
        let mut results: Vec<(UserId, Option<GameResult>)> = details
            .participants
            .iter()
            .map(|p| (p.user_id, p.result))
            .collect();
        results.sort_by_key(|(user_id, _)| *user_id);
        Self {
            status: details.pod.status,
            results,
        }
    }
}

/// A whole-pod rewrite applied in one transaction.
///
/// Used by admin overrides: previously applied stats are reversed, the
/// participant rows are replaced, the status is set and the stats of the new
/// outcome are applied.
#[derive(Debug, Clone)]
pub struct PodRewrite {
    pub expected: PodVersion,
    pub reverse: Vec<StatsDelta>,
    pub participants: Vec<ParticipantUpdate>,
    pub status: PodStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub apply: Vec<StatsDelta>,
}

/// Repository trait for pods and their participants.
///
/// Deleted pods are invisible to every read.
pub trait PodRepository: Send + Sync {
    /// Insert an open pod with the creator as its first participant.
    fn create(
        &self,
        league_id: LeagueId,
        creator_id: UserId,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    fn get(
        &self,
        id: PodId,
    ) -> impl std::future::Future<Output = Result<Option<PodDetails>, RepositoryError>> + Send;

    /// Pods matching `filter`, newest first.
    fn list(
        &self,
        filter: &PodFilter,
    ) -> impl std::future::Future<Output = Result<Vec<PodDetails>, RepositoryError>> + Send;

    /// Add a participant and set the pod status, in one transaction.
    fn add_participant(
        &self,
        pod_id: PodId,
        user_id: UserId,
        status: PodStatus,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    /// Record declared results, reset confirmations (the declarer is
    /// confirmed) and move the pod to pending.
    fn declare_result(
        &self,
        pod_id: PodId,
        results: &[(UserId, GameResult)],
        declared_by: UserId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    fn confirm(
        &self,
        pod_id: PodId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    /// Mark the pod complete and apply stats to league and lifetime records.
    fn complete(
        &self,
        pod_id: PodId,
        league_id: LeagueId,
        deltas: &[StatsDelta],
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    /// Fails with `Conflict` when the pod is no longer at `rewrite.expected`.
    fn rewrite(
        &self,
        pod_id: PodId,
        league_id: LeagueId,
        rewrite: &PodRewrite,
    ) -> impl std::future::Future<Output = Result<PodDetails, RepositoryError>> + Send;

    /// Soft-delete the pod after reversing `reverse`, provided it is still at
    /// `expected`.
    fn soft_delete(
        &self,
        pod_id: PodId,
        league_id: LeagueId,
        expected: &PodVersion,
        reverse: &[StatsDelta],
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
