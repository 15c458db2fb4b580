//! League and enrollment repository trait definition.

use escalation_types::error::RepositoryError;
use escalation_types::league::{
    CreateLeagueRequest, Enrollment, League, LeagueId, LeagueStats, UpdateEnrollmentRequest,
};
use escalation_types::user::UserId;

/// Repository trait for leagues and the `user_leagues` enrollments.
pub trait LeagueRepository: Send + Sync {
    fn create(
        &self,
        request: &CreateLeagueRequest,
    ) -> impl std::future::Future<Output = Result<League, RepositoryError>> + Send;

    fn get(
        &self,
        id: LeagueId,
    ) -> impl std::future::Future<Output = Result<Option<League>, RepositoryError>> + Send;

    /// All leagues, newest start date first.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<League>, RepositoryError>> + Send;

    /// Case-insensitive substring search over name and description.
    fn search(
        &self,
        term: &str,
    ) -> impl std::future::Future<Output = Result<Vec<League>, RepositoryError>> + Send;

    fn get_active(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<League>, RepositoryError>> + Send;

    /// Deactivate every league, then activate `id`, in one transaction.
    fn set_active(
        &self,
        id: LeagueId,
    ) -> impl std::future::Future<Output = Result<League, RepositoryError>> + Send;

    /// Persist every editable field of `league`.
    fn update(
        &self,
        league: &League,
    ) -> impl std::future::Future<Output = Result<League, RepositoryError>> + Send;

    /// Returns `Conflict` when the user is already enrolled.
    fn enroll(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<Enrollment, RepositoryError>> + Send;

    /// Returns `NotFound` when the user was not enrolled.
    fn unenroll(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_enrollment(
        &self,
        user_id: UserId,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<Option<Enrollment>, RepositoryError>> + Send;

    /// Participants of a league, by join time.
    fn list_enrollments(
        &self,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<Vec<Enrollment>, RepositoryError>> + Send;

    /// Leagues a user is enrolled in.
    fn list_user_enrollments(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Enrollment>, RepositoryError>> + Send;

    fn update_enrollment(
        &self,
        user_id: UserId,
        league_id: LeagueId,
        update: &UpdateEnrollmentRequest,
    ) -> impl std::future::Future<Output = Result<Enrollment, RepositoryError>> + Send;

    fn count_participants(
        &self,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    fn stats(
        &self,
        league_id: LeagueId,
    ) -> impl std::future::Future<Output = Result<LeagueStats, RepositoryError>> + Send;
}
