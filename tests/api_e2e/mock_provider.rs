//! Mock identity and OAuth2 provider for E2E tests.
//!
//! Starts an in-process HTTP server that answers the subset of the identity
//! provider's public/admin APIs and the OAuth2 provider's admin/public APIs
//! the server calls. Both providers share one base URL.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, get, post, web};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use uuid::Uuid;

/// Session cookie name the mock expects.
pub const SESSION_COOKIE: &str = "ory_kratos_session";

/// An identity registered with the mock.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub oidc_identifiers: Vec<String>,
}

impl MockIdentity {
    /// Identity document. Session payloads omit `credentials`, admin
    /// lookups include them.
    pub fn to_json(&self, with_credentials: bool) -> Value {
        let mut doc = json!({
            "id": self.id,
            "schema_id": "default",
            "state": "active",
            "traits": {
                "email": self.email,
                "name": { "first": "Test", "last": "User" }
            },
            "verifiable_addresses": [{
                "value": self.email,
                "verified": self.email_verified,
                "via": "email",
                "status": if self.email_verified { "completed" } else { "sent" }
            }]
        });

        if with_credentials {
            let mut credentials = json!({
                "password": { "type": "password", "identifiers": [self.email] }
            });
            if !self.oidc_identifiers.is_empty() {
                credentials["oidc"] = json!({
                    "type": "oidc",
                    "identifiers": self.oidc_identifiers
                });
            }
            doc["credentials"] = credentials;
        }

        doc
    }
}

/// Shared state for the mock provider.
#[derive(Default)]
pub struct MockState {
    /// When set, every session lookup answers 503
    pub unavailable: bool,
    /// When set, the admin client endpoints answer 503
    pub admin_unavailable: bool,
    pub identities: HashMap<Uuid, MockIdentity>,
    /// Session token or cookie value to identity id
    pub sessions: HashMap<String, Uuid>,
    /// Client id to the stored client document (including its secret)
    pub clients: HashMap<String, Value>,
    /// Access token to (client id, scope)
    pub tokens: HashMap<String, (String, String)>,
}

type SharedState = Arc<Mutex<MockState>>;

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "error": { "code": 401, "status": "Unauthorized", "reason": "No valid session credentials found" }
    }))
}

fn admin_down() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({ "error": "temporarily_unavailable" }))
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": { "code": 404, "status": "Not Found" } }))
}

#[get("/sessions/whoami")]
async fn whoami(req: HttpRequest, state: web::Data<SharedState>) -> HttpResponse {
    let state = state.lock().unwrap();
    if state.unavailable {
        return HttpResponse::ServiceUnavailable().finish();
    }

    let token = req
        .headers()
        .get("X-Session-Token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()));

    let Some(identity) = token
        .and_then(|t| state.sessions.get(&t).copied())
        .and_then(|id| state.identities.get(&id))
    else {
        return unauthorized();
    };

    HttpResponse::Ok().json(json!({
        "id": format!("sess-{}", identity.id),
        "active": true,
        "authenticated_at": chrono::Utc::now(),
        "identity": identity.to_json(false)
    }))
}

#[get("/admin/identities/{id}")]
async fn get_identity(path: web::Path<Uuid>, state: web::Data<SharedState>) -> HttpResponse {
    let state = state.lock().unwrap();
    match state.identities.get(&path.into_inner()) {
        Some(identity) => HttpResponse::Ok().json(identity.to_json(true)),
        None => not_found(),
    }
}

#[post("/admin/clients")]
async fn create_client(body: web::Json<Value>, state: web::Data<SharedState>) -> HttpResponse {
    let mut state = state.lock().unwrap();
    if state.admin_unavailable {
        return admin_down();
    }

    let mut doc = body.into_inner();
    let client_id = Uuid::new_v4().to_string();
    doc["client_id"] = json!(client_id);

    state.clients.insert(client_id, doc.clone());
    HttpResponse::Created().json(doc)
}

async fn get_client(path: web::Path<String>, state: web::Data<SharedState>) -> HttpResponse {
    let state = state.lock().unwrap();
    if state.admin_unavailable {
        return admin_down();
    }
    match state.clients.get(&path.into_inner()) {
        Some(doc) => {
            let mut doc = doc.clone();
            if let Some(fields) = doc.as_object_mut() {
                fields.remove("client_secret");
            }
            HttpResponse::Ok().json(doc)
        }
        None => not_found(),
    }
}

async fn put_client(
    path: web::Path<String>,
    body: web::Json<Value>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let client_id = path.into_inner();
    let mut state = state.lock().unwrap();
    if state.admin_unavailable {
        return admin_down();
    }
    if !state.clients.contains_key(&client_id) {
        return not_found();
    }

    let mut doc = body.into_inner();
    doc["client_id"] = json!(client_id);
    state.clients.insert(client_id, doc.clone());
    HttpResponse::Ok().json(doc)
}

async fn delete_client(path: web::Path<String>, state: web::Data<SharedState>) -> HttpResponse {
    let client_id = path.into_inner();
    let mut state = state.lock().unwrap();
    if state.admin_unavailable {
        return admin_down();
    }
    match state.clients.remove(&client_id) {
        Some(_) => {
            state.tokens.retain(|_, (owner, _)| *owner != client_id);
            HttpResponse::NoContent().finish()
        }
        None => not_found(),
    }
}

/// Decode `Authorization: Basic base64(id:secret)`.
fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let value = req.headers().get("Authorization")?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

#[post("/oauth2/token")]
async fn oauth2_token(
    req: HttpRequest,
    form: web::Form<HashMap<String, String>>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let Some((client_id, secret)) = basic_credentials(&req) else {
        return HttpResponse::Unauthorized().json(json!({ "error": "invalid_client" }));
    };
    if form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return HttpResponse::BadRequest().json(json!({ "error": "unsupported_grant_type" }));
    }

    let mut state = state.lock().unwrap();
    let known = state
        .clients
        .get(&client_id)
        .and_then(|doc| doc["client_secret"].as_str())
        .is_some_and(|stored| stored == secret);
    if !known {
        return HttpResponse::Unauthorized().json(json!({ "error": "invalid_client" }));
    }

    let scope = form.get("scope").cloned().unwrap_or_default();
    let access_token = format!("mock-at-{}", Uuid::new_v4().simple());
    state
        .tokens
        .insert(access_token.clone(), (client_id, scope.clone()));

    HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3599,
        "scope": scope
    }))
}

#[post("/admin/oauth2/introspect")]
async fn introspect(
    form: web::Form<HashMap<String, String>>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let state = state.lock().unwrap();
    match form.get("token").and_then(|t| state.tokens.get(t)) {
        Some((client_id, scope)) => HttpResponse::Ok().json(json!({
            "active": true,
            "client_id": client_id,
            "sub": client_id,
            "scope": scope,
            "token_type": "Bearer"
        })),
        None => HttpResponse::Ok().json(json!({ "active": false })),
    }
}

/// Mock provider serving identity and OAuth2 endpoints on one port.
pub struct MockProvider {
    pub url: String,
    pub state: SharedState,
}

impl MockProvider {
    /// Start the mock provider on an ephemeral port.
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(MockState::default()));

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{}", port);

        let state_data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state_data.clone()))
                .service(whoami)
                .service(get_identity)
                .service(create_client)
                .service(
                    web::resource("/admin/clients/{id}")
                        .route(web::get().to(get_client))
                        .route(web::put().to(put_client))
                        .route(web::delete().to(delete_client)),
                )
                .service(oauth2_token)
                .service(introspect)
        })
        .workers(1)
        .listen(listener)
        .expect("failed to listen")
        .disable_signals()
        .run();

        // Lives until the test's runtime shuts down
        tokio::spawn(server);

        MockProvider { url, state }
    }

    /// Register an identity with a single email address.
    pub fn add_identity(&self, email: &str, email_verified: bool) -> MockIdentity {
        let identity = MockIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            email_verified,
            oidc_identifiers: Vec::new(),
        };
        self.state
            .lock()
            .unwrap()
            .identities
            .insert(identity.id, identity.clone());
        identity
    }

    /// Open a session for an identity and return its token.
    pub fn open_session(&self, identity: &MockIdentity) -> String {
        let token = format!("ory_st_{}", Uuid::new_v4().simple());
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(token.clone(), identity.id);
        token
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Make the admin client endpoints fail while the rest keeps working.
    pub fn set_admin_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().admin_unavailable = unavailable;
    }

    pub fn has_client(&self, client_id: &str) -> bool {
        self.state.lock().unwrap().clients.contains_key(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }

    /// Secret the provider currently holds for a client.
    pub fn client_secret(&self, client_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .clients
            .get(client_id)
            .and_then(|doc| doc["client_secret"].as_str())
            .map(str::to_string)
    }
}
