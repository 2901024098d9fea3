//! Refresh handlers
//!
//! Trigger a fetch on one repository or on all of them. Refresh happens
//! synchronously within the request that asks for it; there is no background
//! refresh loop.

use actix_web::{web, HttpResponse};
use tracing::info;

use crate::error::AppError;
use crate::services::directory::DirectoryError;
use crate::AppState;

/// GET|POST /refresh/{repo}
///
/// 200 "OK" on success, 404 for an unknown repository, 500 when the fetch
/// fails (the repository keeps its last-good state).
pub async fn refresh_repo(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let repo = path.into_inner();
    info!(repo = %repo, "refresh requested");
    let directory = state.directory.clone();
    web::block(move || directory.refresh(&repo))
        .await?
        .map_err(map_refresh_error)?;
    Ok(HttpResponse::Ok().body("OK"))
}

/// GET|POST /refreshall
///
/// Refreshes every repository sequentially and stops at the first failure.
/// Earlier repositories keep their refreshed state; later ones are untouched
/// by this call.
pub async fn refresh_all(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    info!("refresh all requested");
    let directory = state.directory.clone();
    web::block(move || directory.refresh_all())
        .await?
        .map_err(map_refresh_error)?;
    Ok(HttpResponse::Ok().body("OK"))
}

fn map_refresh_error(e: DirectoryError) -> AppError {
    match e {
        DirectoryError::UnknownRepository(alias) => {
            AppError::NotFound(format!("unknown repo {alias}"))
        }
        other => AppError::Internal(other.to_string()),
    }
}

/// Configure refresh routes
pub fn configure_refresh_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/refresh/{repo}", web::get().to(refresh_repo))
        .route("/refresh/{repo}", web::post().to(refresh_repo))
        .route("/refreshall", web::get().to(refresh_all))
        .route("/refreshall", web::post().to(refresh_all));
}
