// tests/app_metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

// Full in-process app with live collaborators; only offline routes are hit.
async fn build_app() -> Router {
    alert_relay::app()
        .await
        .expect("app() should build Router in tests")
}

#[tokio::test]
async fn metrics_endpoint_exposes_cache_ttl_gauge() {
    let app = build_app().await;

    // Drive one offline route so at least one counter exists.
    let resp = app
        .clone()
        .oneshot(Request::get("/mock-notifications").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert!(
        resp.headers().contains_key("ratelimit-limit"),
        "/metrics sits behind the rate limiter"
    );

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(
        text.contains("geocode_cache_ttl_seconds"),
        "metrics exposition missing ttl gauge\n{text}"
    );
}

#[tokio::test]
async fn app_can_be_built_twice_in_one_process() {
    let a = build_app().await;
    let b = build_app().await;

    for app in [a, b] {
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
