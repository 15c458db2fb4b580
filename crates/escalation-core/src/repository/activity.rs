//! Activity log repository trait definition.

use escalation_types::activity::{ActivityFilter, ActivityLog, NewActivity};
use escalation_types::error::RepositoryError;
use escalation_types::page::PageRequest;

pub trait ActivityLogRepository: Send + Sync {
    fn insert(
        &self,
        entry: &NewActivity,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Entries matching `filter`, newest first, plus the total match count.
    fn list(
        &self,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<(Vec<ActivityLog>, i64), RepositoryError>> + Send;

    /// Distinct action names, alphabetical.
    fn action_types(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
