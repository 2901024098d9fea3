//! Token-gated public handlers
//!
//! `/public/signin` exchanges basic-auth credentials for a bearer token;
//! `/public/{file,ls,zip}/...` mirror the private content routes but require
//! a valid token and the target repository's public flag.

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::info;

use crate::error::AppError;
use crate::handlers::content::{serve_file, serve_ls_dir, serve_zip_dir};
use crate::services::auth::AccessGate;
use crate::AppState;

/// POST /public/signin
///
/// Exchanges HTTP basic auth for a signed, time-boxed bearer token. 403 for
/// missing or incorrect credentials; 404 when no access gate is configured.
pub async fn signin(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let gate = access_gate(&state)?;
    let (username, password) = basic_auth(&req)
        .ok_or_else(|| AppError::Forbidden("no basic auth information".to_string()))?;
    let token = gate
        .sign_in(&username, &password)
        .map_err(|e| AppError::Forbidden(e.to_string()))?;
    info!(user = %username, "signed token");
    Ok(HttpResponse::Ok().body(token))
}

/// GET /public/file/{repo}/{branch}/{path}
pub async fn get_file(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, file_path) = path.into_inner();
    authorize(&state, &req, &repo)?;
    serve_file(&state, &repo, &branch, &file_path).await
}

/// GET /public/ls/{repo}/{branch}/{dir}
pub async fn ls_dir(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, dir) = path.into_inner();
    authorize(&state, &req, &repo)?;
    serve_ls_dir(&state, &repo, &branch, &dir).await
}

/// GET /public/zip/{repo}/{branch}/{dir}
pub async fn zip_dir(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, dir) = path.into_inner();
    authorize(&state, &req, &repo)?;
    serve_zip_dir(&state, &repo, &branch, &dir).await
}

/// Require a valid bearer token and the repository's public flag.
///
/// A known-but-private repository is reported as not found rather than
/// forbidden, so the gated surface does not reveal which private aliases
/// exist.
fn authorize(state: &AppState, req: &HttpRequest, repo: &str) -> Result<(), AppError> {
    let gate = access_gate(state)?;
    let token = bearer_token(req)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    gate.verify(&token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    if !state.directory.is_public(repo) {
        return Err(AppError::NotFound(format!("unknown repository {repo}")));
    }
    Ok(())
}

fn access_gate<'a>(state: &'a AppState) -> Result<&'a AccessGate, AppError> {
    state
        .access_gate
        .as_ref()
        .ok_or_else(|| AppError::NotFound("public endpoints not configured".to_string()))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

fn basic_auth(req: &HttpRequest) -> Option<(String, String)> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Configure the token-gated public routes
pub fn configure_public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/public/signin", web::post().to(signin))
        .route(
            "/public/file/{repo}/{branch}/{path:.*}",
            web::get().to(get_file),
        )
        .route("/public/ls/{repo}/{branch}/{dir:.*}", web::get().to(ls_dir))
        .route(
            "/public/zip/{repo}/{branch}/{dir:.*}",
            web::get().to(zip_dir),
        );
}
