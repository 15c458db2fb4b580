//! Cache-on-GET middleware.
//!
//! Successful GET responses under cacheable prefixes are memoized per caller
//! and URL. Writes invalidate every cached URL under the prefixes they
//! touch. Responses carry `X-Cache: HIT` or `X-Cache: MISS`.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use escalation_core::cache::CacheTtl;
use escalation_infra::sqlite::api_key::hash_api_key;

use crate::state::AppState;

pub const X_CACHE: &str = "x-cache";

/// A buffered 200 response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Cacheable read prefixes and how long their responses stay fresh.
const CACHEABLE: &[(&str, CacheTtl)] = &[
    ("/api/v1/pods", CacheTtl::Short),
    ("/api/v1/leagues", CacheTtl::Medium),
    ("/api/v1/roles", CacheTtl::Long),
    ("/api/v1/permissions", CacheTtl::Hour),
];

/// Per-caller league resources whose writes happen elsewhere.
const UNCACHED_SUFFIXES: &[&str] = &["/budget", "/enrollment"];

/// Single-league reads embed the current week and lock state, which turn
/// over at the weekly cutoff without any write.
fn carries_week(path: &str) -> bool {
    path.strip_prefix("/api/v1/leagues/")
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/') && rest != "search")
}

fn ttl_for(path: &str) -> Option<Duration> {
    if UNCACHED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) || carries_week(path) {
        return None;
    }
    CACHEABLE
        .iter()
        .find(|(prefix, _)| under(path, prefix))
        .map(|(_, ttl)| ttl.duration())
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

/// What a successful write at `path` makes stale.
#[derive(Debug, PartialEq, Eq)]
enum Invalidation {
    Nothing,
    Prefixes(&'static [&'static str]),
    Everything,
}

fn invalidation_for(path: &str) -> Invalidation {
    if under(path, "/api/v1/pods") {
        // Completing or editing a pod moves standings and league stats.
        Invalidation::Prefixes(&["/api/v1/pods", "/api/v1/leagues"])
    } else if under(path, "/api/v1/leagues") {
        Invalidation::Prefixes(&["/api/v1/leagues"])
    } else if under(path, "/api/v1/roles") || under(path, "/api/v1/users") {
        // Role and account changes alter what any caller may see.
        Invalidation::Everything
    } else {
        Invalidation::Nothing
    }
}

/// Cache key scoped to the caller, so permission-filtered reads never leak.
fn cache_key(path_and_query: &str, headers: &HeaderMap) -> String {
    let credential = headers
        .get(header::AUTHORIZATION)
        .or_else(|| headers.get("x-api-key"))
        .and_then(|v| v.to_str().ok())
        .map(|v| hash_api_key(v.trim_start_matches("Bearer ").trim()))
        .unwrap_or_default();
    format!("{path_and_query}#{credential}")
}

pub async fn cache_layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(cache) = state.cache.clone() else {
        return next.run(request).await;
    };

    let path = request.uri().path().to_string();

    if request.method() != Method::GET {
        let response = next.run(request).await;
        if response.status().is_success() {
            match invalidation_for(&path) {
                Invalidation::Nothing => {}
                Invalidation::Prefixes(prefixes) => {
                    let removed = cache.invalidate_matching(prefixes);
                    tracing::debug!(%path, removed, "invalidated cached reads");
                }
                Invalidation::Everything => {
                    cache.clear();
                    tracing::debug!(%path, "cleared response cache");
                }
            }
        }
        return response;
    }

    let Some(ttl) = ttl_for(&path) else {
        return next.run(request).await;
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or(path);
    let key = cache_key(&path_and_query, request.headers());

    if let Some(hit) = cache.get(&key) {
        let mut response = (StatusCode::OK, hit.body).into_response();
        if let Some(content_type) = hit.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(%key, "failed to buffer response for cache: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    cache.insert(
        key,
        CachedResponse {
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body: bytes.clone(),
        },
        ttl,
    );
    parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_by_prefix() {
        assert_eq!(ttl_for("/api/v1/pods"), Some(Duration::from_secs(60)));
        assert_eq!(ttl_for("/api/v1/leagues/3/leaderboard"), Some(Duration::from_secs(300)));
        assert_eq!(ttl_for("/api/v1/permissions"), Some(Duration::from_secs(3600)));
        assert_eq!(ttl_for("/api/v1/podsX"), None);
        assert_eq!(ttl_for("/api/v1/budgets/1"), None);
        assert_eq!(ttl_for("/api/v1/leagues/3/budget"), None);
        assert_eq!(ttl_for("/api/v1/notifications"), None);
    }

    #[test]
    fn test_league_week_reads_bypass_cache() {
        assert_eq!(ttl_for("/api/v1/leagues/3"), None);
        assert_eq!(ttl_for("/api/v1/leagues/active"), None);
        assert_eq!(ttl_for("/api/v1/leagues"), Some(Duration::from_secs(300)));
        assert_eq!(ttl_for("/api/v1/leagues/search"), Some(Duration::from_secs(300)));
        assert_eq!(ttl_for("/api/v1/leagues/3/stats"), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_writes_invalidate_related_prefixes() {
        assert_eq!(
            invalidation_for("/api/v1/pods/4/confirm"),
            Invalidation::Prefixes(&["/api/v1/pods", "/api/v1/leagues"])
        );
        assert_eq!(
            invalidation_for("/api/v1/leagues/2/signup"),
            Invalidation::Prefixes(&["/api/v1/leagues"])
        );
        assert_eq!(invalidation_for("/api/v1/roles/7/hierarchy"), Invalidation::Everything);
        assert_eq!(invalidation_for("/api/v1/users/me"), Invalidation::Everything);
        assert_eq!(invalidation_for("/api/v1/notifications/read-all"), Invalidation::Nothing);
    }

    #[test]
    fn test_cache_key_separates_callers() {
        let mut alice = HeaderMap::new();
        alice.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer escl_a"));
        let mut bob = HeaderMap::new();
        bob.insert("x-api-key", HeaderValue::from_static("escl_b"));
        let mut alice_again = HeaderMap::new();
        alice_again.insert("x-api-key", HeaderValue::from_static("escl_a"));

        let a = cache_key("/api/v1/pods", &alice);
        assert!(a.starts_with("/api/v1/pods#"));
        assert_ne!(a, cache_key("/api/v1/pods", &bob));
        assert_eq!(a, cache_key("/api/v1/pods", &alice_again));
    }
}
