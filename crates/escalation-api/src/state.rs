//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository traits, but AppState pins them to the
//! SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use escalation_core::cache::TtlCache;
use escalation_core::service::activity::ActivityService;
use escalation_core::service::budget::BudgetService;
use escalation_core::service::league::LeagueService;
use escalation_core::service::notification::NotificationService;
use escalation_core::service::pod::PodService;
use escalation_core::service::rbac::RbacService;
use escalation_core::service::user::UserService;
use escalation_infra::config::load_app_config;
use escalation_infra::filesystem::{database_url, resolve_data_dir};
use escalation_infra::sqlite::activity::SqliteActivityRepository;
use escalation_infra::sqlite::api_key::SqliteApiKeyRepository;
use escalation_infra::sqlite::budget::SqliteBudgetRepository;
use escalation_infra::sqlite::league::SqliteLeagueRepository;
use escalation_infra::sqlite::notification::SqliteNotificationRepository;
use escalation_infra::sqlite::pod::SqlitePodRepository;
use escalation_infra::sqlite::pool::DatabasePool;
use escalation_infra::sqlite::rbac::SqliteRoleRepository;
use escalation_infra::sqlite::user::SqliteUserRepository;
use escalation_types::config::AppConfig;

use crate::http::cache::CachedResponse;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteActivityService = ActivityService<SqliteActivityRepository>;

pub type ConcreteNotificationService = NotificationService<SqliteNotificationRepository>;

pub type ConcreteUserService = UserService<SqliteUserRepository, SqliteActivityRepository>;

pub type ConcreteRbacService = RbacService<SqliteRoleRepository, SqliteActivityRepository>;

pub type ConcreteLeagueService =
    LeagueService<SqliteLeagueRepository, SqliteNotificationRepository, SqliteActivityRepository>;

pub type ConcretePodService = PodService<
    SqlitePodRepository,
    SqliteLeagueRepository,
    SqliteNotificationRepository,
    SqliteActivityRepository,
>;

pub type ConcreteBudgetService =
    BudgetService<SqliteBudgetRepository, SqliteLeagueRepository, SqliteActivityRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<ConcreteUserService>,
    pub rbac_service: Arc<ConcreteRbacService>,
    pub league_service: Arc<ConcreteLeagueService>,
    pub pod_service: Arc<ConcretePodService>,
    pub budget_service: Arc<ConcreteBudgetService>,
    pub notification_service: Arc<ConcreteNotificationService>,
    pub activity_service: Arc<ConcreteActivityService>,
    pub api_keys: SqliteApiKeyRepository,
    /// GET response cache; `None` when disabled in config.
    pub cache: Option<Arc<TtlCache<CachedResponse>>>,
    pub config: AppConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_app_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Ok(Self::from_pool(db_pool, data_dir, config))
    }

    /// Wire every service over an already-open pool.
    pub fn from_pool(db_pool: DatabasePool, data_dir: PathBuf, config: AppConfig) -> Self {
        let activity = || ActivityService::new(SqliteActivityRepository::new(db_pool.clone()));
        let notifications = || NotificationService::new(SqliteNotificationRepository::new(db_pool.clone()));
        let leagues = || SqliteLeagueRepository::new(db_pool.clone());

        let user_service = UserService::new(SqliteUserRepository::new(db_pool.clone()), activity());
        let rbac_service = RbacService::new(SqliteRoleRepository::new(db_pool.clone()), activity());
        let league_service = LeagueService::new(
            leagues(),
            notifications(),
            activity(),
            config.calendar.clone(),
        );
        let pod_service = PodService::new(
            SqlitePodRepository::new(db_pool.clone()),
            leagues(),
            notifications(),
            activity(),
        );
        let budget_service = BudgetService::new(
            SqliteBudgetRepository::new(db_pool.clone()),
            leagues(),
            activity(),
            config.calendar.clone(),
        );

        let cache = config.cache.enabled.then(|| Arc::new(TtlCache::new()));

        Self {
            user_service: Arc::new(user_service),
            rbac_service: Arc::new(rbac_service),
            league_service: Arc::new(league_service),
            pod_service: Arc::new(pod_service),
            budget_service: Arc::new(budget_service),
            notification_service: Arc::new(notifications()),
            activity_service: Arc::new(activity()),
            api_keys: SqliteApiKeyRepository::new(db_pool.clone()),
            cache,
            config,
            data_dir,
        }
    }
}
