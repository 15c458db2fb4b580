//! Activity log service.
//!
//! Writing to the log is best-effort: a failed insert is traced and never
//! fails the operation being logged.

use escalation_types::activity::{
    ActivityFilter, ActivityLog, DEFAULT_ADMIN_LIMIT, DEFAULT_OWN_LIMIT, MAX_ADMIN_LIMIT,
    MAX_OWN_LIMIT, NewActivity,
};
use escalation_types::error::ActivityError;
use escalation_types::page::{Page, PageRequest, Pagination};
use escalation_types::user::UserId;

use crate::repository::activity::ActivityLogRepository;

pub struct ActivityService<A: ActivityLogRepository> {
    repo: A,
}

impl<A: ActivityLogRepository> ActivityService<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    #[cfg(test)]
    pub(crate) fn repo(&self) -> &A {
        &self.repo
    }

    /// Append an entry. Errors are logged, not returned.
    pub async fn log(&self, entry: NewActivity) {
        if let Err(e) = self.repo.insert(&entry).await {
            tracing::warn!(action = %entry.action, error = %e, "failed to record activity");
        }
    }

    /// Every entry matching `filter`, newest first.
    pub async fn list_all(
        &self,
        filter: &ActivityFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<ActivityLog>, ActivityError> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if end < start {
                return Err(ActivityError::Validation(
                    "end date must not precede start date".to_string(),
                ));
            }
        }
        let request = PageRequest::clamped(page, limit, DEFAULT_ADMIN_LIMIT, MAX_ADMIN_LIMIT);
        self.page(filter, request).await
    }

    /// A single user's entries with the smaller per-user limits.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<ActivityLog>, ActivityError> {
        let filter = ActivityFilter {
            user_id: Some(user_id),
            ..ActivityFilter::default()
        };
        let request = PageRequest::clamped(page, limit, DEFAULT_OWN_LIMIT, MAX_OWN_LIMIT);
        self.page(&filter, request).await
    }

    async fn page(
        &self,
        filter: &ActivityFilter,
        request: PageRequest,
    ) -> Result<Page<ActivityLog>, ActivityError> {
        let (items, total) = self
            .repo
            .list(filter, request)
            .await
            .map_err(|e| ActivityError::StorageError(e.to_string()))?;
        Ok(Page {
            items,
            pagination: Pagination::new(request, total),
        })
    }

    pub async fn action_types(&self) -> Result<Vec<String>, ActivityError> {
        self.repo
            .action_types()
            .await
            .map_err(|e| ActivityError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use escalation_types::error::RepositoryError;

    use super::*;

    /// Records inserted entries in memory; optionally fails every insert.
    #[derive(Default)]
    pub(crate) struct MemoryActivityRepo {
        pub entries: Mutex<Vec<NewActivity>>,
        pub fail: bool,
    }

    impl ActivityLogRepository for MemoryActivityRepo {
        async fn insert(&self, entry: &NewActivity) -> Result<(), RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Connection);
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn list(
            &self,
            filter: &ActivityFilter,
            page: PageRequest,
        ) -> Result<(Vec<ActivityLog>, i64), RepositoryError> {
            let entries = self.entries.lock().unwrap();
            let matching: Vec<ActivityLog> = entries
                .iter()
                .enumerate()
                .filter(|(_, e)| filter.user_id.is_none() || e.user_id == filter.user_id)
                .map(|(i, e)| ActivityLog {
                    id: (i as i64 + 1).into(),
                    user_id: e.user_id,
                    action: e.action.clone(),
                    metadata: e.metadata.clone(),
                    timestamp: chrono::Utc::now(),
                    email: None,
                    firstname: None,
                    lastname: None,
                })
                .collect();
            let total = matching.len() as i64;
            let items = matching
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .collect();
            Ok((items, total))
        }

        async fn action_types(&self) -> Result<Vec<String>, RepositoryError> {
            let mut actions: Vec<String> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.action.clone())
                .collect();
            actions.sort();
            actions.dedup();
            Ok(actions)
        }
    }

    #[tokio::test]
    async fn test_log_swallows_errors() {
        let service = ActivityService::new(MemoryActivityRepo {
            fail: true,
            ..Default::default()
        });
        service.log(NewActivity::new(UserId(1), "anything")).await;
    }

    #[tokio::test]
    async fn test_list_for_user_clamps_limit() {
        let service = ActivityService::new(MemoryActivityRepo::default());
        for i in 0..60 {
            service
                .log(NewActivity::new(UserId(1), format!("action {}", i % 3)))
                .await;
        }
        service.log(NewActivity::new(UserId(2), "other")).await;

        let page = service.list_for_user(UserId(1), None, Some(500)).await.unwrap();
        assert_eq!(page.items.len(), 50);
        assert_eq!(page.pagination.total, 60);
        assert_eq!(page.pagination.total_pages, 2);

        let types = service.action_types().await.unwrap();
        assert_eq!(types.len(), 4);
    }

    #[tokio::test]
    async fn test_list_all_rejects_inverted_range() {
        let service = ActivityService::new(MemoryActivityRepo::default());
        let now = chrono::Utc::now();
        let filter = ActivityFilter {
            start: Some(now),
            end: Some(now - chrono::Duration::days(1)),
            ..ActivityFilter::default()
        };
        assert!(matches!(
            service.list_all(&filter, None, None).await,
            Err(ActivityError::Validation(_))
        ));
    }
}
