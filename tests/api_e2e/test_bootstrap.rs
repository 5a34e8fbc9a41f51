//! E2E tests: first-user bootstrap, organizations and memberships.
//! Requires `TEST_DATABASE_URL`.

use futures_util::future::join;
use orgdesk_lib::models::MemberRole;
use serde_json::{Value, json};
use uuid::Uuid;

use super::mock_provider::MockProvider;
use super::test_helpers::*;

fn organizations(body: &Value) -> &Vec<Value> {
    body["organizations"]
        .as_array()
        .expect("organizations array")
}

fn members(body: &Value) -> &Vec<Value> {
    body["members"].as_array().expect("members array")
}

#[actix_rt::test]
async fn test_first_user_owns_default_org_and_later_users_join_it() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    // A registers first
    let alice = mock.add_identity("alice@example.com", true);
    let (status, ack) = deliver_hook(&app, "after-registration", &alice).await;
    assert_eq!(status, 200);
    assert_eq!(ack["created"], true);
    let alice_token = mock.open_session(&alice);

    let (status, me) = send(&app, "GET", "/api/users/me", Some(&alice_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(me["can_create_organizations"], true);

    let (_, body) = send(&app, "GET", "/api/organizations", Some(&alice_token), None).await;
    let orgs = organizations(&body);
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0]["name"], "Default Organization");
    assert_eq!(orgs[0]["is_default"], true);
    assert_eq!(orgs[0]["role"], "owner");

    // B registers second
    let bob = mock.add_identity("bob@example.com", true);
    let (status, _) = deliver_hook(&app, "after-registration", &bob).await;
    assert_eq!(status, 200);
    let bob_token = mock.open_session(&bob);

    let (status, me) = send(&app, "GET", "/api/users/me", Some(&bob_token), None).await;
    assert_eq!(status, 200);
    assert_eq!(me["can_create_organizations"], false);

    let (_, body) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    let orgs = organizations(&body);
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0]["name"], "Default Organization");
    assert_eq!(orgs[0]["role"], "member");

    // B may not create organizations
    let (status, _) = send(
        &app,
        "POST",
        "/api/organizations",
        Some(&bob_token),
        Some(json!({ "name": "Bob Co" })),
    )
    .await;
    assert_eq!(status, 403);

    // A creates Acme
    let (status, acme) = send(
        &app,
        "POST",
        "/api/organizations",
        Some(&alice_token),
        Some(json!({ "name": "Acme" })),
    )
    .await;
    assert_eq!(status, 201, "create Acme: {}", acme);
    assert_eq!(acme["role"], "owner");
    assert_eq!(acme["member_count"], 1);
    let acme_id = acme["id"].as_str().expect("org id").to_string();

    // A invites B
    let (status, link) = send(
        &app,
        "POST",
        &format!("/api/organizations/{}/members", acme_id),
        Some(&alice_token),
        Some(json!({ "user_id": bob.id, "role": "member" })),
    )
    .await;
    assert_eq!(status, 201, "add member: {}", link);
    assert_eq!(link["role"], "member");

    let members_uri = format!("/api/organizations/{}/members", acme_id);
    let (status, body) = send(&app, "GET", &members_uri, Some(&alice_token), None).await;
    assert_eq!(status, 200);
    let list = members(&body);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["user_id"], json!(alice.id));
    assert_eq!(list[1]["user_id"], json!(bob.id));

    // A removes B
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/organizations/{}/members/{}", acme_id, bob.id),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, 204);

    let (_, body) = send(&app, "GET", &members_uri, Some(&alice_token), None).await;
    let list = members(&body);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["user_id"], json!(alice.id));

    // B no longer sees Acme
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/organizations/{}", acme_id),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_repeated_hooks_do_not_duplicate_memberships() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("first@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;

    let bob = mock.add_identity("second@example.com", true);
    let (_, first) = deliver_hook(&app, "after-registration", &bob).await;
    assert_eq!(first["created"], true);
    let (status, again) = deliver_hook(&app, "after-registration", &bob).await;
    assert_eq!(status, 200);
    assert_eq!(again["created"], false);
    let (status, _) = deliver_hook(&app, "after-login", &bob).await;
    assert_eq!(status, 200);
    let (status, _) = deliver_hook(&app, "after-verification", &bob).await;
    assert_eq!(status, 200);

    let bob_token = mock.open_session(&bob);
    let (_, body) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    let orgs = organizations(&body);
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0]["role"], "member");
    assert_eq!(orgs[0]["member_count"], 2);

    let me = pool.find_user(bob.id).await.unwrap().expect("local user");
    assert!(me.last_login_at.is_some());
    assert!(!me.can_create_organizations);
    assert_eq!(pool.count_users().await.unwrap(), 2);
}

#[actix_rt::test]
async fn test_owner_cannot_be_demoted_or_removed() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("owner@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let alice_token = mock.open_session(&alice);

    let (_, body) = send(&app, "GET", "/api/organizations", Some(&alice_token), None).await;
    let default_id = organizations(&body)[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/organizations/{}/members/{}", default_id, alice.id),
        Some(&alice_token),
        Some(json!({ "role": "member" })),
    )
    .await;
    assert_eq!(status, 409);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/organizations/{}/members/{}", default_id, alice.id),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, 409);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/organizations/{}", default_id),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, 409, "default organization cannot be deleted");
}

#[actix_rt::test]
async fn test_profile_update_round_trips() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("profile@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let token = mock.open_session(&alice);

    let (status, updated) = send(
        &app,
        "PUT",
        "/api/users/me",
        Some(&token),
        Some(json!({ "first_name": "Ada", "timezone": "Europe/London" })),
    )
    .await;
    assert_eq!(status, 200, "update: {}", updated);
    assert_eq!(updated["first_name"], "Ada");
    assert_eq!(updated["timezone"], "Europe/London");

    let (status, fetched) = send(
        &app,
        "GET",
        &format!("/api/users/{}", alice.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(fetched["first_name"], "Ada");
}

#[actix_rt::test]
async fn test_concurrent_first_registrations_elect_one_owner() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("racer-a@example.com", true);
    let bob = mock.add_identity("racer-b@example.com", true);
    let ((status_a, ack_a), (status_b, ack_b)) = join(
        deliver_hook(&app, "after-registration", &alice),
        deliver_hook(&app, "after-registration", &bob),
    )
    .await;
    assert_eq!((status_a, status_b), (200, 200));
    assert_eq!(ack_a["created"], true);
    assert_eq!(ack_b["created"], true);

    let users = pool.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(
        users.iter().filter(|u| u.can_create_organizations).count(),
        1,
        "exactly one bootstrap user"
    );

    let mut roles = Vec::new();
    let mut org_ids = Vec::new();
    for identity in [&alice, &bob] {
        let token = mock.open_session(identity);
        let (_, body) = send(&app, "GET", "/api/organizations", Some(&token), None).await;
        let orgs = organizations(&body);
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0]["is_default"], true);
        roles.push(orgs[0]["role"].as_str().unwrap().to_string());
        org_ids.push(orgs[0]["id"].clone());
    }
    roles.sort();
    assert_eq!(roles, vec!["member", "owner"]);
    assert_eq!(org_ids[0], org_ids[1], "one default organization");
}

#[actix_rt::test]
async fn test_concurrent_hooks_for_one_identity_create_one_user() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("twice@example.com", true);
    let ((_, first), (_, second)) = join(
        deliver_hook(&app, "after-registration", &alice),
        deliver_hook(&app, "after-login", &alice),
    )
    .await;

    let created = [&first, &second]
        .into_iter()
        .filter(|ack| ack["created"] == true)
        .count();
    assert_eq!(created, 1);
    assert_eq!(pool.count_users().await.unwrap(), 1);
}

#[actix_rt::test]
async fn test_login_rejoins_user_without_organizations() {
    let mock = MockProvider::start().await;
    let Some((pool, _guard)) = clean_database(&mock.url).await else {
        return;
    };
    let app = create_test_app(&pool, &mock.url).await;

    let alice = mock.add_identity("founder@example.com", true);
    deliver_hook(&app, "after-registration", &alice).await;
    let bob = mock.add_identity("drifter@example.com", true);
    deliver_hook(&app, "after-registration", &bob).await;
    let bob_token = mock.open_session(&bob);

    let (_, body) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    let default_id: Uuid = organizations(&body)[0]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    pool.remove_member(default_id, bob.id).await.unwrap();
    let (_, body) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    assert!(organizations(&body).is_empty());

    let (status, _) = deliver_hook(&app, "after-login", &bob).await;
    assert_eq!(status, 200);

    let membership = pool
        .find_membership(default_id, bob.id)
        .await
        .unwrap()
        .expect("member link restored");
    assert_eq!(membership.role, MemberRole::Member);

    let (_, body) = send(&app, "GET", "/api/organizations", Some(&bob_token), None).await;
    assert_eq!(organizations(&body).len(), 1);
}
