//! OAuth2 machine-to-machine client API handlers.

use actix_web::{Either, HttpResponse, web};

use crate::auth::VerifiedUser;
use crate::error::AppResult;
use crate::models::{
    ClientAuditResponse, ClientListResponse, ClientSecretResponse, CreateClientRequest,
    DeleteClientQuery, IntrospectionResponse, OAuth2Client, TokenRequest, TokenResponse,
    ValidateTokenRequest,
};
use crate::services::ClientManager;

/// Register a client. The secret is only ever returned in this response.
#[utoipa::path(
    post,
    path = "/api/oauth2/clients",
    tag = "OAuth2 Clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created", body = ClientSecretResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 502, description = "OAuth2 provider unavailable", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn create_client(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
    body: web::Json<CreateClientRequest>,
) -> AppResult<HttpResponse> {
    let created = manager.create(auth.user_id(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

/// List clients the caller owns or administers.
#[utoipa::path(
    get,
    path = "/api/oauth2/clients",
    tag = "OAuth2 Clients",
    responses(
        (status = 200, description = "Clients, newest first", body = ClientListResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn list_clients(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
) -> AppResult<HttpResponse> {
    let clients = manager.list(auth.user_id()).await?;
    Ok(HttpResponse::Ok().json(ClientListResponse { clients }))
}

/// Get a client. Never includes the secret.
#[utoipa::path(
    get,
    path = "/api/oauth2/clients/{client_id}",
    tag = "OAuth2 Clients",
    params(("client_id" = String, Path, description = "Provider client ID")),
    responses(
        (status = 200, description = "Client", body = OAuth2Client),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn get_client(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let client = manager.get(auth.user_id(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(client))
}

/// Revoke a client, or remove it entirely with `?hard=true`.
#[utoipa::path(
    delete,
    path = "/api/oauth2/clients/{client_id}",
    tag = "OAuth2 Clients",
    params(
        ("client_id" = String, Path, description = "Provider client ID"),
        ("hard" = Option<bool>, Query, description = "Delete the local record as well")
    ),
    responses(
        (status = 200, description = "Client revoked", body = OAuth2Client),
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse),
        (status = 502, description = "OAuth2 provider unavailable", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn delete_client(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
    path: web::Path<String>,
    query: web::Query<DeleteClientQuery>,
) -> AppResult<HttpResponse> {
    let client_id = path.into_inner();

    if query.hard {
        manager.delete(auth.user_id(), &client_id).await?;
        return Ok(HttpResponse::NoContent().finish());
    }

    let revoked = manager.revoke(auth.user_id(), &client_id).await?;
    Ok(HttpResponse::Ok().json(revoked))
}

/// Audit trail for a client, oldest first.
#[utoipa::path(
    get,
    path = "/api/oauth2/clients/{client_id}/audit",
    tag = "OAuth2 Clients",
    params(("client_id" = String, Path, description = "Provider client ID")),
    responses(
        (status = 200, description = "Audit entries", body = ClientAuditResponse),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn client_audit(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let entries = manager
        .audit_log(auth.user_id(), &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ClientAuditResponse { entries }))
}

/// Issue a new secret for an active client.
#[utoipa::path(
    post,
    path = "/api/oauth2/clients/{client_id}/regenerate",
    tag = "OAuth2 Clients",
    params(("client_id" = String, Path, description = "Provider client ID")),
    responses(
        (status = 200, description = "New secret", body = ClientSecretResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Client is revoked", body = crate::error::ErrorResponse),
    ),
    security(("session_token" = []), ("session_cookie" = []))
)]
pub async fn regenerate_secret(
    auth: VerifiedUser,
    manager: web::Data<ClientManager>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let rotated = manager
        .regenerate_secret(auth.user_id(), &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(rotated))
}

/// Client-credentials token grant. Accepts a form or JSON body.
#[utoipa::path(
    post,
    path = "/api/oauth2/token",
    tag = "OAuth2 Tokens",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 400, description = "Unsupported grant or scope", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid client credentials", body = crate::error::ErrorResponse),
    )
)]
pub async fn issue_token(
    manager: web::Data<ClientManager>,
    body: Either<web::Form<TokenRequest>, web::Json<TokenRequest>>,
) -> AppResult<HttpResponse> {
    let req = match body {
        Either::Left(form) => form.into_inner(),
        Either::Right(json) => json.into_inner(),
    };
    let token = manager.issue_token(req).await?;
    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .json(token))
}

/// Introspect an access token.
#[utoipa::path(
    post,
    path = "/api/oauth2/validate",
    tag = "OAuth2 Tokens",
    request_body = ValidateTokenRequest,
    responses(
        (status = 200, description = "Introspection result", body = IntrospectionResponse),
        (status = 400, description = "Missing token", body = crate::error::ErrorResponse),
        (status = 502, description = "OAuth2 provider unavailable", body = crate::error::ErrorResponse),
    )
)]
pub async fn validate_token(
    manager: web::Data<ClientManager>,
    body: Either<web::Json<ValidateTokenRequest>, web::Form<ValidateTokenRequest>>,
) -> AppResult<HttpResponse> {
    let req = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let result = manager.validate(req).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Configure client management routes. Mounted behind the verification gate.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/oauth2/clients")
            .route(web::get().to(list_clients))
            .route(web::post().to(create_client)),
    )
    .service(
        web::resource("/oauth2/clients/{client_id}")
            .route(web::get().to(get_client))
            .route(web::delete().to(delete_client)),
    )
    .service(
        web::resource("/oauth2/clients/{client_id}/regenerate")
            .route(web::post().to(regenerate_secret)),
    )
    .service(
        web::resource("/oauth2/clients/{client_id}/audit").route(web::get().to(client_audit)),
    );
}

/// Configure the public token routes. These authenticate the client, not a
/// session.
pub fn configure_token_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/oauth2/token").route(web::post().to(issue_token)))
        .service(web::resource("/oauth2/validate").route(web::post().to(validate_token)));
}
