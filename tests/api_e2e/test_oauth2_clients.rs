//! E2E tests: OAuth2 client lifecycle against the mock provider.
//! Requires `TEST_DATABASE_URL`.

use actix_web::test;
use orgdesk_lib::models::oauth2_client::secret_fingerprint;
use serde_json::{Value, json};

use super::mock_provider::MockProvider;
use super::test_helpers::*;

/// Register an owner with the default organization and open a session.
async fn owner_session<S>(app: &S, mock: &MockProvider, email: &str) -> (String, String)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let identity = mock.add_identity(email, true);
    deliver_hook(app, "after-registration", &identity).await;
    let token = mock.open_session(&identity);

    let (_, orgs) = send(app, "GET", "/api/organizations", Some(&token), None).await;
    let org_id = orgs["organizations"][0]["id"].as_str().unwrap().to_string();
    (token, org_id)
}

fn audit_actions(body: &Value) -> Vec<String> {
    body["entries"]
        .as_array()
        .expect("entries array")
        .iter()
        .map(|e| e["action"].as_str().unwrap_or_default().to_string())
        .collect()
}

async fn request_token<S>(app: &S, client_id: &str, client_secret: &str) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri("/api/oauth2/token")
        .set_form([
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_rt::test]
async fn test_secret_is_returned_once_and_tokens_work() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("ops@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let token = mock.open_session(&alice);

    let (_, orgs) = send(&app, "GET", "/api/organizations", Some(&token), None).await;
    let org_id = orgs["organizations"][0]["id"].as_str().unwrap().to_string();

    let (status, created) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({
            "name": "ci-runner",
            "organization_id": org_id,
            "scope": "orgs:read  orgs:write"
        })),
    )
    .await;
    assert_eq!(status, 201, "create client: {}", created);
    let client_id = created["client_id"].as_str().unwrap().to_string();
    let secret = created["client_secret"].as_str().unwrap().to_string();
    assert!(!secret.is_empty());
    assert_eq!(created["scope"], "orgs:read orgs:write");
    assert!(mock.has_client(&client_id));

    // The secret never appears again
    let (status, fetched) = send(
        &app,
        "GET",
        &format!("/api/oauth2/clients/{}", client_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert!(fetched.get("client_secret").is_none());
    assert_eq!(fetched["is_active"], true);

    let (_, listed) = send(&app, "GET", "/api/oauth2/clients", Some(&token), None).await;
    let clients = listed["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert!(clients[0].get("client_secret").is_none());

    // Client-credentials grant and introspection
    let (status, issued) = request_token(&app, &client_id, &secret).await;
    assert_eq!(status, 200, "token: {}", issued);
    let access_token = issued["access_token"].as_str().unwrap().to_string();

    let (status, introspected) = send(
        &app,
        "POST",
        "/api/oauth2/validate",
        None,
        Some(json!({ "token": access_token })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(introspected["active"], true);
    assert_eq!(introspected["client_id"], json!(client_id));

    let (status, _) = request_token(&app, &client_id, "wrong-secret").await;
    assert_eq!(status, 401);

    // Regeneration invalidates the old secret
    let (status, rotated) = send(
        &app,
        "POST",
        &format!("/api/oauth2/clients/{}/regenerate", client_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200, "regenerate: {}", rotated);
    let new_secret = rotated["client_secret"].as_str().unwrap().to_string();
    assert_ne!(new_secret, secret);

    let (status, _) = request_token(&app, &client_id, &secret).await;
    assert_eq!(status, 401);
    let (status, _) = request_token(&app, &client_id, &new_secret).await;
    assert_eq!(status, 200);

    let (status, audit) = send(
        &app,
        "GET",
        &format!("/api/oauth2/clients/{}/audit", client_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    let actions = audit_actions(&audit);
    assert_eq!(actions.first().map(String::as_str), Some("created"));
    assert!(actions.iter().any(|a| a == "token_issued"));
    assert!(actions.iter().any(|a| a == "secret_regenerated"));
}

#[actix_rt::test]
async fn test_revoke_then_hard_delete() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("revoker@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let token = mock.open_session(&alice);
    let (_, orgs) = send(&app, "GET", "/api/organizations", Some(&token), None).await;
    let org_id = orgs["organizations"][0]["id"].as_str().unwrap().to_string();

    let (_, created) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({ "name": "nightly", "organization_id": org_id })),
    )
    .await;
    let client_id = created["client_id"].as_str().unwrap().to_string();
    let secret = created["client_secret"].as_str().unwrap().to_string();
    let client_uri = format!("/api/oauth2/clients/{}", client_id);

    let (status, revoked) = send(&app, "DELETE", &client_uri, Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(revoked["is_active"], false);
    assert!(!mock.has_client(&client_id));

    // Revoking twice is harmless
    let (status, _) = send(&app, "DELETE", &client_uri, Some(&token), None).await;
    assert_eq!(status, 200);

    let (status, _) = request_token(&app, &client_id, &secret).await;
    assert_eq!(status, 401);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/regenerate", client_uri),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 409, "revoked clients cannot be regenerated");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{}?hard=true", client_uri),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 204);

    let (status, _) = send(&app, "GET", &client_uri, Some(&token), None).await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_plain_members_cannot_manage_clients() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("boss@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let bob = mock.add_identity("staff@example.com", true);
    deliver_hook(&app, "after-registration", &bob).await;

    let alice_token = mock.open_session(&alice);
    let bob_token = mock.open_session(&bob);
    let (_, orgs) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    let org_id = orgs["organizations"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&bob_token),
        Some(json!({ "name": "sneaky", "organization_id": org_id })),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "INSUFFICIENT_ROLE");

    let (_, created) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&alice_token),
        Some(json!({ "name": "deploy", "organization_id": org_id })),
    )
    .await;
    let client_id = created["client_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/oauth2/clients/{}", client_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, 403);

    let (_, listed) = send(&app, "GET", "/api/oauth2/clients", Some(&bob_token), None).await;
    assert_eq!(listed["clients"].as_array().map(Vec::len), Some(0));
}

#[actix_rt::test]
async fn test_failed_provider_delete_keeps_client_active() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;
    let (token, org_id) = owner_session(&app, &mock, "ops@example.com").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({ "name": "exporter", "organization_id": org_id })),
    )
    .await;
    let client_id = created["client_id"].as_str().unwrap().to_string();
    let secret = created["client_secret"].as_str().unwrap().to_string();
    let client_uri = format!("/api/oauth2/clients/{}", client_id);

    mock.set_admin_unavailable(true);

    let (status, body) = send(&app, "DELETE", &client_uri, Some(&token), None).await;
    assert_eq!(status, 502, "revoke: {}", body);
    assert_eq!(body["error"], "UPSTREAM_UNAVAILABLE");

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("{}?hard=true", client_uri),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 502);

    let (status, fetched) = send(&app, "GET", &client_uri, Some(&token), None).await;
    assert_eq!(status, 200);
    assert_eq!(fetched["is_active"], true, "local row is reactivated");

    mock.set_admin_unavailable(false);
    assert!(mock.has_client(&client_id));
    let (status, _) = request_token(&app, &client_id, &secret).await;
    assert_eq!(status, 200);
}

#[actix_rt::test]
async fn test_failed_local_insert_removes_provider_client() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;
    let (token, org_id) = owner_session(&app, &mock, "ops@example.com").await;

    reject_client_inserts(&pool).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({ "name": "orphan", "organization_id": org_id })),
    )
    .await;
    clear_client_write_faults(&pool).await;

    assert_eq!(status, 500, "create: {}", body);
    assert!(body.get("client_secret").is_none());
    assert_eq!(mock.client_count(), 0, "provider registration is rolled back");

    let (_, listed) = send(&app, "GET", "/api/oauth2/clients", Some(&token), None).await;
    assert_eq!(listed["clients"].as_array().map(Vec::len), Some(0));
}

#[actix_rt::test]
async fn test_create_with_provider_down_writes_nothing() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;
    let (token, org_id) = owner_session(&app, &mock, "ops@example.com").await;

    mock.set_admin_unavailable(true);
    let (status, _) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({ "name": "never", "organization_id": org_id })),
    )
    .await;
    assert_eq!(status, 502);

    let (_, listed) = send(&app, "GET", "/api/oauth2/clients", Some(&token), None).await;
    assert_eq!(listed["clients"].as_array().map(Vec::len), Some(0));
}

#[actix_rt::test]
async fn test_unmirrored_rotation_is_audited() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;
    let (token, org_id) = owner_session(&app, &mock, "ops@example.com").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/oauth2/clients",
        Some(&token),
        Some(json!({ "name": "rotator", "organization_id": org_id })),
    )
    .await;
    let client_id = created["client_id"].as_str().unwrap().to_string();
    let old_secret = created["client_secret"].as_str().unwrap().to_string();
    let client_uri = format!("/api/oauth2/clients/{}", client_id);

    reject_secret_rotation(&pool).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/regenerate", client_uri),
        Some(&token),
        None,
    )
    .await;
    clear_client_write_faults(&pool).await;

    assert_eq!(status, 500, "regenerate: {}", body);
    assert!(body.get("client_secret").is_none());

    let provider_secret = mock.client_secret(&client_id).expect("provider client");
    assert_ne!(provider_secret, old_secret, "provider rotated the secret");

    let (_, local) = send(&app, "GET", &client_uri, Some(&token), None).await;
    assert_eq!(local["secret_fingerprint"], json!(secret_fingerprint(&old_secret)));

    let (_, audit) = send(
        &app,
        "GET",
        &format!("{}/audit", client_uri),
        Some(&token),
        None,
    )
    .await;
    let entry = audit["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["action"] == "secret_regenerated")
        .expect("rotation is recorded")
        .clone();
    assert_eq!(entry["detail"]["local_update_failed"], true);
    assert_eq!(
        entry["detail"]["secret_fingerprint"],
        json!(secret_fingerprint(&provider_secret))
    );
}
