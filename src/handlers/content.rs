//! Checkout content handlers
//!
//! HTTP handlers for file fetch, directory listing, and archive packaging.

use actix_web::{web, HttpResponse};
use tracing::debug;

use crate::error::AppError;
use crate::services::checkout::CheckoutError;
use crate::services::directory::DirectoryError;
use crate::AppState;

/// GET /file/{repo}/{branch}/{path}
///
/// Raw bytes of one tracked file.
pub async fn get_file(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, file_path) = path.into_inner();
    serve_file(&state, &repo, &branch, &file_path).await
}

/// GET /ls/{repo}/{branch}/{dir}
///
/// JSON array of the directory's immediate children. An empty `dir` lists
/// the repository root.
pub async fn ls_dir(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, dir) = path.into_inner();
    serve_ls_dir(&state, &repo, &branch, &dir).await
}

/// GET /zip/{repo}/{branch}/{dir}
///
/// Zip archive of every tracked file under `dir`.
pub async fn zip_dir(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (repo, branch, dir) = path.into_inner();
    serve_zip_dir(&state, &repo, &branch, &dir).await
}

pub(crate) async fn serve_file(
    state: &AppState,
    repo: &str,
    branch: &str,
    path: &str,
) -> Result<HttpResponse, AppError> {
    debug!(repo, branch, path, "get file handler");
    let checkout = state.directory.get(repo).map_err(map_directory_error)?.clone();
    let branch = branch.to_string();
    let path = path.to_string();
    let content = web::block(move || checkout.get_file(&branch, &path))
        .await?
        .map_err(map_checkout_error)?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(content))
}

pub(crate) async fn serve_ls_dir(
    state: &AppState,
    repo: &str,
    branch: &str,
    dir: &str,
) -> Result<HttpResponse, AppError> {
    debug!(repo, branch, dir, "ls dir handler");
    let checkout = state.directory.get(repo).map_err(map_directory_error)?.clone();
    let branch = branch.to_string();
    let dir = dir.to_string();
    let stats = web::block(move || checkout.ls_dir(&branch, &dir))
        .await?
        .map_err(map_checkout_error)?;
    Ok(HttpResponse::Ok().json(stats))
}

pub(crate) async fn serve_zip_dir(
    state: &AppState,
    repo: &str,
    branch: &str,
    dir: &str,
) -> Result<HttpResponse, AppError> {
    debug!(repo, branch, dir, "zip dir handler");
    let checkout = state.directory.get(repo).map_err(map_directory_error)?.clone();
    let branch = branch.to_string();
    let prefix = dir.to_string();
    let (archive, num_files) = web::block(move || checkout.zip_content(&branch, &prefix))
        .await?
        .map_err(map_checkout_error)?;
    // Zero matched files is "nothing found at that path" at this layer.
    if num_files == 0 {
        return Err(AppError::NotFound(format!("no files found under {dir}")));
    }
    Ok(HttpResponse::Ok()
        .content_type("application/zip")
        .body(archive))
}

/// Map directory errors to application errors
pub(crate) fn map_directory_error(e: DirectoryError) -> AppError {
    match e {
        DirectoryError::UnknownRepository(alias) => {
            AppError::NotFound(format!("unknown repository {alias}"))
        }
        DirectoryError::Refresh { .. } => AppError::Internal(e.to_string()),
        DirectoryError::Checkout(inner) => map_checkout_error(inner),
        other => AppError::Internal(other.to_string()),
    }
}

/// Map checkout errors to application errors
pub(crate) fn map_checkout_error(e: CheckoutError) -> AppError {
    match e {
        CheckoutError::UnknownBranch(_)
        | CheckoutError::FileNotFound(_)
        | CheckoutError::DirectoryNotFound(_) => AppError::NotFound(e.to_string()),
        other => AppError::Internal(other.to_string()),
    }
}

/// Configure content routes
pub fn configure_content_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/file/{repo}/{branch}/{path:.*}", web::get().to(get_file))
        .route("/ls/{repo}/{branch}/{dir:.*}", web::get().to(ls_dir))
        .route("/zip/{repo}/{branch}/{dir:.*}", web::get().to(zip_dir));
}
