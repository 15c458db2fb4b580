//! Query parameter extractors for list endpoints.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use escalation_types::activity::ActivityFilter;
use escalation_types::league::LeagueId;
use escalation_types::pod::{PodFilter, PodStatus};
use escalation_types::rbac::RoleId;
use escalation_types::user::{UserFilter, UserId};

use crate::http::error::AppError;

/// Page-number pagination.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters for the user list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Substring of email, first or last name.
    pub search: Option<String>,
    pub role_id: Option<RoleId>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl UserListQuery {
    pub fn filter(&self) -> UserFilter {
        UserFilter {
            is_active: self.is_active,
            role_id: self.role_id,
            search: self.search.clone(),
            include_deleted: self.include_deleted,
        }
    }
}

/// Query parameters for the pod list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct PodListQuery {
    pub league_id: Option<LeagueId>,
    /// open, active, pending or complete.
    pub status: Option<String>,
    pub player_id: Option<UserId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PodListQuery {
    pub fn filter(&self) -> Result<PodFilter, AppError> {
        let status = match &self.status {
            Some(s) => Some(s.parse::<PodStatus>().map_err(AppError::Validation)?),
            None => None,
        };
        Ok(PodFilter {
            league_id: self.league_id,
            status,
            player_id: self.player_id,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Query parameters for the caller's notification list.
#[derive(Debug, Deserialize, Default)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for the activity log list.
#[derive(Debug, Deserialize, Default)]
pub struct ActivityListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Substring of the action text.
    pub action: Option<String>,
    pub user_id: Option<UserId>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (start of day, UTC).
    pub start_date: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (end of day, UTC).
    pub end_date: Option<String>,
}

impl ActivityListQuery {
    pub fn filter(&self) -> Result<ActivityFilter, AppError> {
        let start = self
            .start_date
            .as_deref()
            .map(|s| parse_bound(s, NaiveTime::MIN))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|s| parse_bound(s, end_of_day()))
            .transpose()?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(AppError::Validation(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(ActivityFilter {
            action: self.action.clone(),
            user_id: self.user_id,
            start,
            end,
        })
    }
}

/// Free-text search.
#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN)
}

fn parse_bound(value: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|_| {
            AppError::Validation(format!(
                "invalid date '{value}': expected YYYY-MM-DD or an RFC 3339 timestamp"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_activity_dates_accept_plain_dates() {
        let query = ActivityListQuery {
            start_date: Some("2025-02-01".into()),
            end_date: Some("2025-02-01".into()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.start.unwrap().to_rfc3339(), "2025-02-01T00:00:00+00:00");
        assert_eq!(filter.end.unwrap().hour(), 23);
    }

    #[test]
    fn test_activity_dates_accept_rfc3339_and_reject_garbage() {
        let query = ActivityListQuery {
            start_date: Some("2025-02-01T12:00:00-05:00".into()),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap().start.unwrap().hour(), 17);

        let bad = ActivityListQuery {
            end_date: Some("last tuesday".into()),
            ..Default::default()
        };
        assert!(matches!(bad.filter(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_activity_range_must_be_ordered() {
        let query = ActivityListQuery {
            start_date: Some("2025-03-01".into()),
            end_date: Some("2025-02-01".into()),
            ..Default::default()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn test_pod_status_parsed() {
        let query = PodListQuery {
            status: Some("Pending".into()),
            ..Default::default()
        };
        assert_eq!(query.filter().unwrap().status, Some(PodStatus::Pending));

        let bad = PodListQuery {
            status: Some("finished".into()),
            ..Default::default()
        };
        assert!(bad.filter().is_err());
    }
}
