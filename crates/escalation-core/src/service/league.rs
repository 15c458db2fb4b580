//! League and enrollment service.

use escalation_types::activity::{NewActivity, actions};
use escalation_types::config::CalendarConfig;
use escalation_types::error::{LeagueError, RepositoryError};
use escalation_types::league::{
    CreateLeagueRequest, DEFAULT_POINTS_PER_DRAW, DEFAULT_POINTS_PER_LOSS, DEFAULT_POINTS_PER_WIN,
    Enrollment, LeaderboardEntry, League, LeagueDetails, LeagueId, LeagueStats, LeagueWeek,
    UpdateEnrollmentRequest, UpdateLeagueRequest, rank_leaderboard,
};
use escalation_types::notification::templates;
use escalation_types::user::{User, UserId};
use serde_json::json;

use crate::calendar::LeagueCalendar;
use crate::repository::activity::ActivityLogRepository;
use crate::repository::league::LeagueRepository;
use crate::repository::notification::NotificationRepository;
use crate::service::activity::ActivityService;
use crate::service::notification::NotificationService;
use crate::service::{Clock, system_clock};

/// Longest season accepted, in days.
pub const MAX_LEAGUE_DAYS: i64 = 2 * 366;

fn storage(e: RepositoryError) -> LeagueError {
    LeagueError::StorageError(e.to_string())
}

/// Check the fields shared by create and update.
fn validate_league(league: &League, calendar: &CalendarConfig) -> Result<(), LeagueError> {
    if league.name.trim().is_empty() {
        return Err(LeagueError::Validation("name cannot be empty".to_string()));
    }
    if league.weekly_budget.is_negative() {
        return Err(LeagueError::Validation(
            "weekly budget cannot be negative".to_string(),
        ));
    }
    if matches!(league.max_players, Some(max) if max < 1) {
        return Err(LeagueError::Validation(
            "max players must be at least 1".to_string(),
        ));
    }
    if league.points_per_win < 0 || league.points_per_loss < 0 || league.points_per_draw < 0 {
        return Err(LeagueError::Validation(
            "points cannot be negative".to_string(),
        ));
    }
    LeagueCalendar::for_league(league, calendar)?;
    if (league.end_date - league.start_date).num_days() > MAX_LEAGUE_DAYS {
        return Err(LeagueError::Validation(format!(
            "a league can run for at most {MAX_LEAGUE_DAYS} days"
        )));
    }
    Ok(())
}

pub struct LeagueService<L: LeagueRepository, N: NotificationRepository, A: ActivityLogRepository> {
    repo: L,
    notifications: NotificationService<N>,
    activity: ActivityService<A>,
    calendar: CalendarConfig,
    clock: Clock,
}

impl<L: LeagueRepository, N: NotificationRepository, A: ActivityLogRepository> LeagueService<L, N, A> {
    pub fn new(
        repo: L,
        notifications: NotificationService<N>,
        activity: ActivityService<A>,
        calendar: CalendarConfig,
    ) -> Self {
        Self {
            repo,
            notifications,
            activity,
            calendar,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn create_league(
        &self,
        actor: UserId,
        mut request: CreateLeagueRequest,
    ) -> Result<League, LeagueError> {
        request.name = request.name.trim().to_string();
        let now = (self.clock)();
        let draft = League {
            id: LeagueId(0),
            name: request.name.clone(),
            description: request.description.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            weekly_budget: request.weekly_budget,
            is_active: false,
            league_code: request.league_code.clone(),
            max_players: request.max_players,
            points_per_win: request.points_per_win.unwrap_or(DEFAULT_POINTS_PER_WIN),
            points_per_loss: request.points_per_loss.unwrap_or(DEFAULT_POINTS_PER_LOSS),
            points_per_draw: request.points_per_draw.unwrap_or(DEFAULT_POINTS_PER_DRAW),
            created_at: now,
            updated_at: now,
        };
        validate_league(&draft, &self.calendar)?;

        let league = self.repo.create(&request).await.map_err(storage)?;
        tracing::info!(league_id = %league.id, name = %league.name, "created league");
        self.activity
            .log(NewActivity::new(actor, actions::LEAGUE_CREATED).with_metadata(json!({
                "league_id": league.id,
                "name": league.name,
            })))
            .await;
        Ok(league)
    }

    pub async fn update_league(
        &self,
        actor: UserId,
        id: LeagueId,
        request: UpdateLeagueRequest,
    ) -> Result<League, LeagueError> {
        let mut league = self.get_league(id).await?;
        request.apply(&mut league);
        league.name = league.name.trim().to_string();
        validate_league(&league, &self.calendar)?;

        let league = self.repo.update(&league).await.map_err(|e| match e {
            RepositoryError::NotFound => LeagueError::NotFound,
            other => storage(other),
        })?;
        self.activity
            .log(NewActivity::new(actor, actions::LEAGUE_UPDATED).with_metadata(json!({
                "league_id": league.id,
            })))
            .await;
        Ok(league)
    }

    pub async fn list_leagues(&self) -> Result<Vec<League>, LeagueError> {
        self.repo.list().await.map_err(storage)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<League>, LeagueError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(LeagueError::Validation(
                "search term cannot be empty".to_string(),
            ));
        }
        self.repo.search(term).await.map_err(storage)
    }

    pub async fn get_league(&self, id: LeagueId) -> Result<League, LeagueError> {
        self.repo
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(LeagueError::NotFound)
    }

    /// Calendar position of `league` right now.
    pub fn week(&self, league: &League) -> Result<LeagueWeek, LeagueError> {
        let calendar = LeagueCalendar::for_league(league, &self.calendar)?;
        Ok(calendar.week_info((self.clock)()))
    }

    pub async fn details(&self, league: League) -> Result<LeagueDetails, LeagueError> {
        let week = self.week(&league)?;
        let participant_count = self
            .repo
            .count_participants(league.id)
            .await
            .map_err(storage)?;
        Ok(LeagueDetails {
            league,
            week,
            participant_count,
        })
    }

    pub async fn league_details(&self, id: LeagueId) -> Result<LeagueDetails, LeagueError> {
        let league = self.get_league(id).await?;
        self.details(league).await
    }

    pub async fn active_league(&self) -> Result<League, LeagueError> {
        self.repo
            .get_active()
            .await
            .map_err(storage)?
            .ok_or(LeagueError::NoActiveLeague)
    }

    /// Make `id` the only active league.
    pub async fn set_active(&self, actor: UserId, id: LeagueId) -> Result<League, LeagueError> {
        self.get_league(id).await?;
        let league = self.repo.set_active(id).await.map_err(|e| match e {
            RepositoryError::NotFound => LeagueError::NotFound,
            other => storage(other),
        })?;
        tracing::info!(league_id = %id, "league set active");
        self.activity
            .log(NewActivity::new(actor, actions::LEAGUE_ACTIVATED).with_metadata(json!({ "league_id": id })))
            .await;
        Ok(league)
    }

    /// Enroll `user` in a league and tell the admins.
    pub async fn signup(&self, user: &User, league_id: LeagueId) -> Result<Enrollment, LeagueError> {
        let league = self.get_league(league_id).await?;

        if let Some(max) = league.max_players {
            let count = self
                .repo
                .count_participants(league_id)
                .await
                .map_err(storage)?;
            if count >= max {
                return Err(LeagueError::LeagueFull);
            }
        }

        let enrollment = self
            .repo
            .enroll(user.id, league_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => LeagueError::AlreadyEnrolled,
                other => storage(other),
            })?;

        self.notifications
            .notify_admins_quietly(&templates::new_signup_request(
                &user.display_name(),
                &league.name,
                league.id,
            ))
            .await;
        self.notifications
            .notify(user.id, &templates::signup_approved(&league.name, league.id))
            .await;
        self.activity
            .log(NewActivity::new(user.id, actions::LEAGUE_SIGNUP).with_metadata(json!({
                "league_id": league_id,
                "league_name": league.name,
            })))
            .await;
        Ok(enrollment)
    }

    pub async fn leave(&self, user_id: UserId, league_id: LeagueId) -> Result<(), LeagueError> {
        self.get_league(league_id).await?;
        self.repo
            .unenroll(user_id, league_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => LeagueError::NotEnrolled,
                other => storage(other),
            })?;
        self.activity
            .log(NewActivity::new(user_id, actions::LEAGUE_LEFT).with_metadata(json!({ "league_id": league_id })))
            .await;
        Ok(())
    }

    pub async fn participants(&self, league_id: LeagueId) -> Result<Vec<Enrollment>, LeagueError> {
        self.get_league(league_id).await?;
        self.repo.list_enrollments(league_id).await.map_err(storage)
    }

    pub async fn user_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, LeagueError> {
        self.repo.list_user_enrollments(user_id).await.map_err(storage)
    }

    pub async fn enrollment(&self, user_id: UserId, league_id: LeagueId) -> Result<Enrollment, LeagueError> {
        self.repo
            .get_enrollment(user_id, league_id)
            .await
            .map_err(storage)?
            .ok_or(LeagueError::NotEnrolled)
    }

    pub async fn update_enrollment(
        &self,
        user_id: UserId,
        league_id: LeagueId,
        request: UpdateEnrollmentRequest,
    ) -> Result<Enrollment, LeagueError> {
        if request.commander.is_none() && request.decklist_url.is_none() {
            return Err(LeagueError::Validation(
                "nothing to update: provide commander or decklist_url".to_string(),
            ));
        }
        if let Some(url) = request.decklist_url.as_deref() {
            if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(LeagueError::Validation(
                    "decklist_url must be an http(s) URL".to_string(),
                ));
            }
        }
        self.enrollment(user_id, league_id).await?;
        self.repo
            .update_enrollment(user_id, league_id, &request)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => LeagueError::NotEnrolled,
                other => storage(other),
            })
    }

    pub async fn stats(&self, league_id: LeagueId) -> Result<LeagueStats, LeagueError> {
        self.get_league(league_id).await?;
        self.repo.stats(league_id).await.map_err(storage)
    }

    pub async fn leaderboard(&self, league_id: LeagueId) -> Result<Vec<LeaderboardEntry>, LeagueError> {
        let participants = self.participants(league_id).await?;
        Ok(rank_leaderboard(participants))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::{NaiveDate, TimeZone, Utc};
    use escalation_types::money::Money;
    use escalation_types::rbac::RoleId;

    use super::*;
    use crate::service::activity::tests::MemoryActivityRepo;
    use crate::service::fixed_clock;
    use crate::service::notification::tests::MemoryNotificationRepo;

    /// Leagues and enrollments kept in memory.
    #[derive(Default)]
    pub(crate) struct MemoryLeagueRepo {
        pub leagues: Mutex<Vec<League>>,
        pub enrollments: Mutex<Vec<Enrollment>>,
    }

    impl MemoryLeagueRepo {
        pub fn with_league(league: League) -> Self {
            Self {
                leagues: Mutex::new(vec![league]),
                ..Default::default()
            }
        }
    }

    impl LeagueRepository for MemoryLeagueRepo {
        async fn create(&self, request: &CreateLeagueRequest) -> Result<League, RepositoryError> {
            let mut leagues = self.leagues.lock().unwrap();
            let now = Utc::now();
            let league = League {
                id: LeagueId(leagues.len() as i64 + 1),
                name: request.name.clone(),
                description: request.description.clone(),
                start_date: request.start_date,
                end_date: request.end_date,
                weekly_budget: request.weekly_budget,
                is_active: false,
                league_code: request.league_code.clone(),
                max_players: request.max_players,
                points_per_win: request.points_per_win.unwrap_or(DEFAULT_POINTS_PER_WIN),
                points_per_loss: request.points_per_loss.unwrap_or(DEFAULT_POINTS_PER_LOSS),
                points_per_draw: request.points_per_draw.unwrap_or(DEFAULT_POINTS_PER_DRAW),
                created_at: now,
                updated_at: now,
            };
            leagues.push(league.clone());
            Ok(league)
        }

        async fn get(&self, id: LeagueId) -> Result<Option<League>, RepositoryError> {
            Ok(self.leagues.lock().unwrap().iter().find(|l| l.id == id).cloned())
        }

        async fn list(&self) -> Result<Vec<League>, RepositoryError> {
            let mut leagues = self.leagues.lock().unwrap().clone();
            leagues.sort_by(|a, b| b.start_date.cmp(&a.start_date));
            Ok(leagues)
        }

        async fn search(&self, term: &str) -> Result<Vec<League>, RepositoryError> {
            let term = term.to_lowercase();
            Ok(self
                .leagues
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.name.to_lowercase().contains(&term))
                .cloned()
                .collect())
        }

        async fn get_active(&self) -> Result<Option<League>, RepositoryError> {
            Ok(self.leagues.lock().unwrap().iter().find(|l| l.is_active).cloned())
        }

        async fn set_active(&self, id: LeagueId) -> Result<League, RepositoryError> {
            let mut leagues = self.leagues.lock().unwrap();
            for league in leagues.iter_mut() {
                league.is_active = league.id == id;
            }
            leagues.iter().find(|l| l.id == id).cloned().ok_or(RepositoryError::NotFound)
        }

        async fn update(&self, league: &League) -> Result<League, RepositoryError> {
            let mut leagues = self.leagues.lock().unwrap();
            let stored = leagues
                .iter_mut()
                .find(|l| l.id == league.id)
                .ok_or(RepositoryError::NotFound)?;
            *stored = league.clone();
            Ok(league.clone())
        }

        async fn enroll(&self, user_id: UserId, league_id: LeagueId) -> Result<Enrollment, RepositoryError> {
            let league_name = self
                .leagues
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.id == league_id)
                .map(|l| l.name.clone())
                .ok_or(RepositoryError::NotFound)?;
            let mut enrollments = self.enrollments.lock().unwrap();
            if enrollments.iter().any(|e| e.user_id == user_id && e.league_id == league_id) {
                return Err(RepositoryError::Conflict("already enrolled".to_string()));
            }
            let enrollment = Enrollment {
                user_id,
                league_id,
                league_name,
                firstname: format!("P{user_id}"),
                lastname: "Test".into(),
                league_wins: 0,
                league_losses: 0,
                league_draws: 0,
                total_points: 0,
                matches_played: 0,
                commander: None,
                decklist_url: None,
                joined_at: Utc::now(),
            };
            enrollments.push(enrollment.clone());
            Ok(enrollment)
        }

        async fn unenroll(&self, user_id: UserId, league_id: LeagueId) -> Result<(), RepositoryError> {
            let mut enrollments = self.enrollments.lock().unwrap();
            let before = enrollments.len();
            enrollments.retain(|e| !(e.user_id == user_id && e.league_id == league_id));
            if enrollments.len() == before {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        }

        async fn get_enrollment(
            &self,
            user_id: UserId,
            league_id: LeagueId,
        ) -> Result<Option<Enrollment>, RepositoryError> {
            Ok(self
                .enrollments
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.user_id == user_id && e.league_id == league_id)
                .cloned())
        }

        async fn list_enrollments(&self, league_id: LeagueId) -> Result<Vec<Enrollment>, RepositoryError> {
            Ok(self
                .enrollments
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.league_id == league_id)
                .cloned()
                .collect())
        }

        async fn list_user_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
            Ok(self
                .enrollments
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn update_enrollment(
            &self,
            user_id: UserId,
            league_id: LeagueId,
            update: &UpdateEnrollmentRequest,
        ) -> Result<Enrollment, RepositoryError> {
            let mut enrollments = self.enrollments.lock().unwrap();
            let enrollment = enrollments
                .iter_mut()
                .find(|e| e.user_id == user_id && e.league_id == league_id)
                .ok_or(RepositoryError::NotFound)?;
            if let Some(commander) = &update.commander {
                enrollment.commander = Some(commander.clone());
            }
            if let Some(url) = &update.decklist_url {
                enrollment.decklist_url = Some(url.clone());
            }
            Ok(enrollment.clone())
        }

        async fn count_participants(&self, league_id: LeagueId) -> Result<i64, RepositoryError> {
            Ok(self
                .enrollments
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.league_id == league_id)
                .count() as i64)
        }

        async fn stats(&self, league_id: LeagueId) -> Result<LeagueStats, RepositoryError> {
            Ok(LeagueStats {
                league_id,
                participants: self.count_participants(league_id).await?,
                open_pods: 0,
                active_pods: 0,
                pending_pods: 0,
                completed_pods: 0,
                total_points_awarded: 0,
            })
        }
    }

    pub(crate) fn player(id: i64) -> User {
        let now = Utc::now();
        User {
            id: UserId(id),
            email: format!("p{id}@example.com"),
            firstname: format!("P{id}"),
            lastname: "Test".into(),
            role_id: RoleId(6),
            role_name: "league_user".into(),
            is_active: true,
            is_deleted: false,
            wins: 0,
            losses: 0,
            draws: 0,
            created_at: now,
            updated_at: now,
        }
    }

    type TestLeagueService = LeagueService<MemoryLeagueRepo, MemoryNotificationRepo, MemoryActivityRepo>;

    fn service(repo: MemoryLeagueRepo) -> TestLeagueService {
        let notifications = MemoryNotificationRepo {
            admins: vec![UserId(1)],
            ..Default::default()
        };
        LeagueService::new(
            repo,
            NotificationService::new(notifications),
            ActivityService::new(MemoryActivityRepo::default()),
            CalendarConfig::default(),
        )
        .with_clock(fixed_clock(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()))
    }

    pub(crate) fn league(start: (i32, u32, u32), end: (i32, u32, u32)) -> League {
        League {
            id: LeagueId(1),
            name: "Spring".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            weekly_budget: Money::from_dollars(10.0),
            is_active: false,
            league_code: None,
            max_players: None,
            points_per_win: 4,
            points_per_loss: 1,
            points_per_draw: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_league() {
        let config = CalendarConfig::default();
        assert!(validate_league(&league((2025, 1, 3), (2025, 3, 28)), &config).is_ok());
        assert!(matches!(
            validate_league(&league((2025, 3, 28), (2025, 1, 3)), &config),
            Err(LeagueError::Calendar(_))
        ));

        let mut bad = league((2025, 1, 3), (2025, 3, 28));
        bad.weekly_budget = Money::from_cents(-1);
        assert!(matches!(validate_league(&bad, &config), Err(LeagueError::Validation(_))));

        let mut bad = league((2025, 1, 3), (2025, 3, 28));
        bad.max_players = Some(0);
        assert!(matches!(validate_league(&bad, &config), Err(LeagueError::Validation(_))));

        let mut bad = league((2025, 1, 3), (2025, 3, 28));
        bad.name = "  ".into();
        assert!(matches!(validate_league(&bad, &config), Err(LeagueError::Validation(_))));
    }

    #[test]
    fn test_validate_league_caps_season_length() {
        let config = CalendarConfig::default();
        assert!(validate_league(&league((2025, 1, 3), (2026, 12, 31)), &config).is_ok());
        assert!(matches!(
            validate_league(&league((2025, 1, 3), (2125, 1, 3)), &config),
            Err(LeagueError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_refused_when_league_full() {
        let mut full = league((2025, 1, 6), (2025, 3, 31));
        full.max_players = Some(1);
        let svc = service(MemoryLeagueRepo::with_league(full));

        svc.signup(&player(2), LeagueId(1)).await.unwrap();
        assert!(matches!(
            svc.signup(&player(3), LeagueId(1)).await,
            Err(LeagueError::LeagueFull)
        ));
        assert_eq!(svc.participants(LeagueId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signup_notifies_player_and_admins() {
        let svc = service(MemoryLeagueRepo::with_league(league((2025, 1, 6), (2025, 3, 31))));
        svc.signup(&player(2), LeagueId(1)).await.unwrap();

        assert_eq!(svc.notifications.repo().titles_for(UserId(2)).len(), 1);
        assert_eq!(svc.notifications.repo().titles_for(UserId(1)).len(), 1);
        assert!(matches!(
            svc.signup(&player(2), LeagueId(1)).await,
            Err(LeagueError::AlreadyEnrolled)
        ));
    }

    #[tokio::test]
    async fn test_create_league_rejects_century_season() {
        let svc = service(MemoryLeagueRepo::default());
        let request = CreateLeagueRequest {
            name: "Forever".into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2125, 1, 6).unwrap(),
            weekly_budget: Money::from_dollars(10.0),
            league_code: None,
            max_players: None,
            points_per_win: None,
            points_per_loss: None,
            points_per_draw: None,
        };
        assert!(matches!(
            svc.create_league(UserId(1), request).await,
            Err(LeagueError::Validation(_))
        ));
        assert!(svc.list_leagues().await.unwrap().is_empty());
    }
}
