mod error;
mod handlers;
mod types;

use std::time::Duration;

use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assembles the four endpoints the service exposes (spec §6). Every
/// response carries an `x-request-id` header (generated if the caller
/// didn't send one), and it's folded into the request's tracing span so
/// log lines for one call can be correlated across the stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/check", post(handlers::check))
        .route("/v1/status/:key", get(handlers::status))
        .route("/v1/reset/:key", post(handlers::reset))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                info_span!("request", method = %req.method(), path = %req.uri().path(), request_id)
            }),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(5)))
        .layer(CorsLayer::permissive())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use quota_core::config::LimitConfig;
    use quota_core::{Dispatcher, FixedWindowAlgorithm, RateLimitAlgorithm, TestClock, TokenBucketAlgorithm};
    use quota_core::store::LocalStore;
    use tower::ServiceExt; // for .oneshot

    use super::router;
    use crate::state::AppState;

    fn test_state() -> AppState {
        let store = Arc::new(LocalStore::new());
        let clock = TestClock::new(SystemTime::now());
        let config = LimitConfig::new(3, Duration::from_secs(60), 0).unwrap();
        let algorithms: Vec<Arc<dyn RateLimitAlgorithm>> = vec![
            Arc::new(TokenBucketAlgorithm::new(store.clone(), config, Arc::new(clock.clone()))),
            Arc::new(FixedWindowAlgorithm::new(store, config, Arc::new(clock))),
        ];
        let dispatcher = Arc::new(Dispatcher::new(algorithms, "fixed_window").unwrap());
        let mut dispatchers = HashMap::new();
        dispatchers.insert("default".to_string(), dispatcher);
        AppState::new(dispatchers)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = router(test_state());
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert!(body["time"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn check_allows_then_denies_past_the_limit() {
        let router = router(test_state());
        let payload = serde_json::json!({"identifier": "u1", "resource": "api.search"}).to_string();

        for _ in 0..3 {
            let req = Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(payload.clone()))
                .unwrap();
            let resp = router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn check_response_carries_rate_limit_headers() {
        let router = router(test_state());
        let payload = serde_json::json!({"identifier": "u2", "resource": "api.search"}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert!(resp.headers().contains_key("x-ratelimit-limit"));
        assert!(resp.headers().contains_key("x-ratelimit-remaining"));
        assert!(resp.headers().contains_key("x-ratelimit-reset"));
        let body = body_json(resp).await;
        assert!(body["reset_at"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn unknown_algorithm_is_bad_request() {
        let router = router(test_state());
        let payload =
            serde_json::json!({"identifier": "u3", "resource": "api.search", "algorithm": "nope"}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_tier_is_bad_request() {
        let router = router(test_state());
        let payload =
            serde_json::json!({"identifier": "u4", "resource": "api.search", "tier": "nonexistent"}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_then_check_behaves_cold() {
        let router = router(test_state());
        let payload = serde_json::json!({"identifier": "u5", "resource": "api.search", "count": 3}).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/check")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        assert_eq!(router.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);

        let req = Request::builder()
            .method("POST")
            .uri("/v1/reset/u5:api.search")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "rate limit reset successfully");

        let req = Request::builder()
            .method("GET")
            .uri("/v1/status/u5:api.search")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["remaining"], 3);
    }
}
