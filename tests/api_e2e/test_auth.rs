//! E2E tests: requests rejected before any database access.

use actix_web::test;
use serde_json::{Value, json};
use uuid::Uuid;

use super::mock_provider::{MockProvider, SESSION_COOKIE};
use super::test_helpers::*;

#[actix_rt::test]
async fn test_health_is_always_ok() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[actix_rt::test]
async fn test_ready_reports_unreachable_database() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "NOT_READY");
}

#[actix_rt::test]
async fn test_protected_endpoints_require_a_session() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;
    let some_id = Uuid::new_v4();

    let cases: Vec<(&str, String, Option<Value>)> = vec![
        ("GET", "/api/whoami".to_string(), None),
        ("GET", "/api/users".to_string(), None),
        ("GET", "/api/users/me".to_string(), None),
        ("GET", format!("/api/users/{}", some_id), None),
        ("GET", "/api/organizations".to_string(), None),
        (
            "POST",
            "/api/organizations".to_string(),
            Some(json!({ "name": "Acme" })),
        ),
        ("GET", format!("/api/organizations/{}/members", some_id), None),
        ("GET", "/api/oauth2/clients".to_string(), None),
        (
            "POST",
            "/api/oauth2/clients".to_string(),
            Some(json!({ "name": "ci", "organization_id": some_id })),
        ),
    ];

    for (method, uri, body) in cases {
        let (status, resp) = send(&app, method, &uri, None, body).await;
        assert_eq!(status, 401, "{} {} should require a session", method, uri);
        assert_eq!(resp["error"], "UNAUTHENTICATED");
    }
}

#[actix_rt::test]
async fn test_unknown_bearer_token_rejected() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(&app, "GET", "/api/users/me", Some("ory_st_bogus"), None).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[actix_rt::test]
async fn test_invalid_session_wins_over_malformed_arguments() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/organizations/not-a-uuid",
        Some("ory_st_expired"),
        None,
    )
    .await;
    assert_eq!(status, 401, "malformed path id: {}", body);
    assert_eq!(body["error"], "UNAUTHENTICATED");

    // Bodiless POST: the JSON extractor would answer 400 if it ran first
    let (status, body) = send(
        &app,
        "POST",
        "/api/organizations",
        Some("ory_st_expired"),
        None,
    )
    .await;
    assert_eq!(status, 401, "missing body: {}", body);
    assert_eq!(body["error"], "UNAUTHENTICATED");

    let req = test::TestRequest::put()
        .uri("/api/organizations/not-a-uuid/members/also-not-a-uuid")
        .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE, "stale-cookie"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_rt::test]
async fn test_policy_runs_before_path_extraction() {
    let mock = MockProvider::start().await;
    let carol = mock.add_identity("carol@example.com", false);
    let token = mock.open_session(&carol);

    // With no database the policy cannot count users, so the gate fails
    // with a database error rather than letting the path through
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/organizations/not-a-uuid",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 500, "{}", body);
    assert_eq!(body["error"], "DATABASE_ERROR");
}

#[actix_rt::test]
async fn test_user_count_failure_never_verifies() {
    let mock = MockProvider::start().await;
    let carol = mock.add_identity("unverified@example.com", false);
    let token = mock.open_session(&carol);

    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(&app, "GET", "/api/users", Some(&token), None).await;
    assert_eq!(status, 500, "count failure must not pass the gate: {}", body);
    assert_eq!(body["error"], "DATABASE_ERROR");
}

#[actix_rt::test]
async fn test_unknown_cookie_rejected() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE, "not-a-session"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_rt::test]
async fn test_provider_outage_is_unauthenticated() {
    let mock = MockProvider::start().await;
    let identity = mock.add_identity("outage@example.com", true);
    let token = mock.open_session(&identity);
    mock.set_unavailable(true);

    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(&app, "GET", "/api/whoami", Some(&token), None).await;
    assert_eq!(status, 401, "provider outage must not grant access");
    assert_eq!(body["error"], "UNAUTHENTICATED");
}

#[actix_rt::test]
async fn test_webhook_requires_shared_secret() {
    let mock = MockProvider::start().await;
    let identity = mock.add_identity("hook@example.com", true);
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let body = json!({ "identity": identity.to_json(false) });

    let (status, _) = send(
        &app,
        "POST",
        "/hooks/after-registration",
        None,
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, 401, "missing secret");

    let req = test::TestRequest::post()
        .uri("/hooks/after-login")
        .insert_header(("X-Webhook-Secret", "wrong-secret"))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401, "wrong secret");
}

#[actix_rt::test]
async fn test_webhook_rejects_identity_without_email() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let req = test::TestRequest::post()
        .uri("/hooks/after-registration")
        .insert_header(("X-Webhook-Secret", TEST_WEBHOOK_SECRET))
        .set_json(json!({ "identity": { "id": Uuid::new_v4(), "traits": {} } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_token_endpoint_rejects_other_grants() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let req = test::TestRequest::post()
        .uri("/api/oauth2/token")
        .set_form([
            ("grant_type", "password"),
            ("client_id", "some-client"),
            ("client_secret", "some-secret"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_rt::test]
async fn test_validate_requires_token() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/oauth2/validate",
        None,
        Some(json!({ "token": "  " })),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_validate_reports_inactive_token() {
    let mock = MockProvider::start().await;
    let pool = unreachable_pool().await;
    let app = create_test_app(&pool, &mock.url).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/oauth2/validate",
        None,
        Some(json!({ "token": "mock-at-unknown" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["active"], false);
}
