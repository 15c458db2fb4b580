//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: response cache, gzip compression, CORS, tracing.

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::cache::cache_layer;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Users
        .route(
            "/users/me",
            get(handlers::users::get_me)
                .put(handlers::users::update_me)
                .delete(handlers::users::delete_me),
        )
        .route("/users/me/activity", get(handlers::users::my_activity))
        .route("/users/me/permissions", get(handlers::users::my_permissions))
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/users/{id}", get(handlers::users::get_user))
        .route("/users/{id}/role", put(handlers::users::change_role))
        .route("/users/{id}/activate", post(handlers::users::activate_user))
        .route("/users/{id}/deactivate", post(handlers::users::deactivate_user))
        .route("/users/{id}/activity", get(handlers::users::user_activity))
        // Leagues
        .route(
            "/leagues",
            get(handlers::leagues::list_leagues).post(handlers::leagues::create_league),
        )
        .route("/leagues/search", get(handlers::leagues::search_leagues))
        .route("/leagues/active", get(handlers::leagues::active_league))
        .route(
            "/leagues/{id}",
            get(handlers::leagues::get_league).put(handlers::leagues::update_league),
        )
        .route("/leagues/{id}/activate", post(handlers::leagues::activate_league))
        .route(
            "/leagues/{id}/signup",
            post(handlers::leagues::signup).delete(handlers::leagues::leave),
        )
        .route(
            "/leagues/{id}/enrollment",
            get(handlers::leagues::get_enrollment).put(handlers::leagues::update_enrollment),
        )
        .route("/leagues/{id}/participants", get(handlers::leagues::participants))
        .route("/leagues/{id}/stats", get(handlers::leagues::stats))
        .route("/leagues/{id}/leaderboard", get(handlers::leagues::leaderboard))
        .route(
            "/leagues/{id}/budget",
            get(handlers::leagues::get_budget).post(handlers::leagues::create_budget),
        )
        // Pods
        .route(
            "/pods",
            get(handlers::pods::list_pods).post(handlers::pods::create_pod),
        )
        .route(
            "/pods/{id}",
            get(handlers::pods::get_pod)
                .put(handlers::pods::admin_update)
                .delete(handlers::pods::delete_pod),
        )
        .route("/pods/{id}/join", post(handlers::pods::join_pod))
        .route("/pods/{id}/result", post(handlers::pods::declare_result))
        .route("/pods/{id}/confirm", post(handlers::pods::confirm_result))
        .route(
            "/pods/{id}/participants/{user_id}",
            delete(handlers::pods::remove_participant),
        )
        .route(
            "/pods/{id}/participants/{user_id}/result",
            put(handlers::pods::set_participant_result),
        )
        // Budgets
        .route(
            "/budgets/{id}",
            get(handlers::budgets::get_budget).put(handlers::budgets::update_budget),
        )
        .route(
            "/budgets/{id}/cards",
            get(handlers::budgets::list_cards).post(handlers::budgets::add_card),
        )
        .route(
            "/budgets/{id}/cards/{card_id}",
            put(handlers::budgets::update_card).delete(handlers::budgets::remove_card),
        )
        .route("/budgets/{id}/summary", get(handlers::budgets::summary))
        // Notifications
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications)
                .post(handlers::notifications::send_notification),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notifications::unread_count),
        )
        .route("/notifications/read-all", put(handlers::notifications::mark_all_read))
        .route("/notifications/bulk", post(handlers::notifications::send_bulk))
        .route("/notifications/admins", post(handlers::notifications::notify_admins))
        .route("/notifications/{id}/read", put(handlers::notifications::mark_read))
        .route(
            "/notifications/{id}",
            delete(handlers::notifications::delete_notification),
        )
        // Activity
        .route("/activity", get(handlers::activity::list_activity))
        .route("/activity/types", get(handlers::activity::action_types))
        // Roles and permissions
        .route("/permissions", get(handlers::roles::list_permissions))
        .route(
            "/roles",
            get(handlers::roles::list_roles).post(handlers::roles::create_role),
        )
        .route("/roles/hierarchy", get(handlers::roles::hierarchy))
        .route("/roles/matrix", get(handlers::roles::matrix))
        .route("/roles/{id}", delete(handlers::roles::delete_role))
        .route(
            "/roles/{id}/permissions",
            get(handlers::roles::role_permissions).put(handlers::roles::update_role_permissions),
        )
        .route("/roles/{id}/hierarchy", put(handlers::roles::update_role_hierarchy));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(from_fn_with_state(state.clone(), cache_layer))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use escalation_infra::sqlite::pool::DatabasePool;
    use escalation_types::config::AppConfig;
    use escalation_types::user::CreateUserRequest;

    use super::*;
    use crate::http::extractors::auth::ensure_api_key;

    struct TestApp {
        state: AppState,
        admin_key: String,
        _dir: tempfile::TempDir,
    }

    async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        let state = AppState::from_pool(pool, dir.path().to_path_buf(), AppConfig::default());
        let admin_key = ensure_api_key(&state).await.unwrap().unwrap();
        TestApp {
            state,
            admin_key,
            _dir: dir,
        }
    }

    impl TestApp {
        /// Create a `league_user` account and return an API key for it.
        async fn player_key(&self, email: &str) -> String {
            let user = self
                .state
                .user_service
                .create_user(
                    None,
                    CreateUserRequest {
                        email: email.to_string(),
                        firstname: "Pat".to_string(),
                        lastname: "Player".to_string(),
                        role: None,
                    },
                )
                .await
                .unwrap();
            self.state.api_keys.create(user.id, "test").await.unwrap().1
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            key: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Option<String>, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(key) = key {
                builder = builder.header("authorization", format!("Bearer {key}"));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = build_router(self.state.clone()).oneshot(request).await.unwrap();
            let status = response.status();
            let cache = response
                .headers()
                .get("x-cache")
                .map(|v| v.to_str().unwrap().to_string());
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, cache, json)
        }
    }

    fn spring_league() -> Value {
        json!({
            "name": "Spring League",
            "start_date": "2025-01-03",
            "end_date": "2025-03-28",
            "weekly_budget": 10.0
        })
    }

    #[tokio::test]
    async fn test_health_needs_no_key() {
        let app = test_app().await;
        let (status, _, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_and_invalid_keys_are_rejected() {
        let app = test_app().await;

        let (status, _, body) = app.call(Method::GET, "/api/v1/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"][0]["code"], "UNAUTHORIZED");
        assert!(body["data"].is_null());

        let (status, _, _) = app
            .call(Method::GET, "/api/v1/users/me", Some("escl_nope"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_profile() {
        let app = test_app().await;
        let (status, _, body) = app
            .call(Method::GET, "/api/v1/users/me", Some(&app.admin_key), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role_name"], "super_admin");
        assert_eq!(body["data"]["leagues"], json!([]));
        assert!(body["meta"]["request_id"].is_string());

        // A second call finds the existing key and creates nothing.
        assert!(ensure_api_key(&app.state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_player_lacks_admin_permissions() {
        let app = test_app().await;
        let player = app.player_key("pat@example.com").await;

        let (status, _, body) = app
            .call(Method::POST, "/api/v1/leagues", Some(&player), Some(spring_league()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errors"][0]["code"], "FORBIDDEN");

        let (status, _, body) = app
            .call(Method::GET, "/api/v1/users/me/permissions", Some(&player), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["data"]["permissions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        // Inherited from `user`.
        assert!(names.contains(&"league_signup"));
        assert!(names.contains(&"pod_create"));
        assert!(!names.contains(&"league_create"));
    }

    #[tokio::test]
    async fn test_league_signup_and_pod_flow() {
        let app = test_app().await;
        let player = app.player_key("pat@example.com").await;

        let (status, _, body) = app
            .call(Method::POST, "/api/v1/leagues", Some(&app.admin_key), Some(spring_league()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let league_id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["points_per_win"], 4);

        // Not enrolled yet.
        let (status, _, body) = app
            .call(Method::POST, "/api/v1/pods", Some(&player), Some(json!({ "league_id": league_id })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errors"][0]["code"], "NOT_ENROLLED");

        let signup = format!("/api/v1/leagues/{league_id}/signup");
        let (status, _, _) = app.call(Method::POST, &signup, Some(&player), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _, body) = app.call(Method::POST, &signup, Some(&player), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["errors"][0]["code"], "ALREADY_ENROLLED");

        let (status, _, body) = app
            .call(Method::POST, "/api/v1/pods", Some(&player), Some(json!({ "league_id": league_id })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "open");
        assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 1);

        // The admin was told about the signup.
        let (_, _, body) = app
            .call(Method::GET, "/api/v1/notifications/unread-count", Some(&app.admin_key), None)
            .await;
        assert_eq!(body["data"]["unread"], 1);
    }

    #[tokio::test]
    async fn test_get_responses_are_cached_until_a_write() {
        let app = test_app().await;
        let key = Some(app.admin_key.as_str());

        let (_, cache, _) = app.call(Method::GET, "/api/v1/leagues", key, None).await;
        assert_eq!(cache.as_deref(), Some("MISS"));
        let (_, cache, body) = app.call(Method::GET, "/api/v1/leagues", key, None).await;
        assert_eq!(cache.as_deref(), Some("HIT"));
        assert_eq!(body["data"], json!([]));

        let (status, _, _) = app
            .call(Method::POST, "/api/v1/leagues", key, Some(spring_league()))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, cache, body) = app.call(Method::GET, "/api/v1/leagues", key, None).await;
        assert_eq!(cache.as_deref(), Some("MISS"));
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        // Uncached resources carry no header.
        let (_, cache, _) = app.call(Method::GET, "/api/v1/notifications", key, None).await;
        assert_eq!(cache, None);

        // A single league reports its live week, so it is never memoized.
        let id = body["data"][0]["id"].as_i64().unwrap();
        let league = format!("/api/v1/leagues/{id}");
        for _ in 0..2 {
            let (status, cache, body) = app.call(Method::GET, &league, key, None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(cache, None);
            assert!(body["data"]["week"]["current_week"].is_u64());
        }
    }

    #[tokio::test]
    async fn test_hierarchy_cycle_is_rejected() {
        let app = test_app().await;
        let key = Some(app.admin_key.as_str());

        // league_admin already inherits from league_user (via pod_admin).
        let (status, _, body) = app
            .call(
                Method::PUT,
                "/api/v1/roles/6/hierarchy",
                key,
                Some(json!({ "parent_role_id": 2 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "CIRCULAR_HIERARCHY");

        let (status, _, body) = app
            .call(Method::DELETE, "/api/v1/roles/1", key, None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errors"][0]["code"], "PROTECTED_ROLE");
    }

    #[tokio::test]
    async fn test_permission_matrix_marks_inherited_cells() {
        let app = test_app().await;
        let (status, _, body) = app
            .call(Method::GET, "/api/v1/roles/matrix", Some(&app.admin_key), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let rows = body["data"]["roles"].as_array().unwrap();
        let league_user = rows
            .iter()
            .find(|row| row["role"]["name"] == "league_user")
            .unwrap();
        // league_signup (7) comes from `user` (5).
        let cell = &league_user["permissions"]["7"];
        assert_eq!(cell["has_permission"], true);
        assert_eq!(cell["is_direct"], false);
        assert_eq!(cell["source_role_name"], "user");
        // pod_create (13) is direct.
        assert_eq!(league_user["permissions"]["13"]["is_direct"], true);
    }

    #[tokio::test]
    async fn test_huge_page_number_returns_empty_page() {
        let app = test_app().await;
        let (status, _, body) = app
            .call(
                Method::GET,
                "/api/v1/activity?page=9223372036854775807",
                Some(&app.admin_key),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["items"], json!([]));
        assert_eq!(body["data"]["pagination"]["page"], i64::MAX);

        let (status, _, _) = app
            .call(
                Method::GET,
                "/api/v1/users/me/activity?page=9223372036854775807",
                Some(&app.admin_key),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_user_activity_is_404() {
        let app = test_app().await;
        let (status, _, body) = app
            .call(Method::GET, "/api/v1/users/999/activity", Some(&app.admin_key), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["code"], "USER_NOT_FOUND");
    }
}
