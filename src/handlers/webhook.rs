//! Push webhook handler
//!
//! Verifies a push-notification signature, maps the event's remote URL to a
//! checkout, and refreshes it.

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::webhook::{parse_push_event, verify_push_signature, SIGNATURE_HEADER};
use crate::AppState;

/// POST /public/github/webhook
///
/// 403 on a bad signature, 400 on a malformed or unrecognized event, 500
/// when the refresh itself fails, 200 otherwise. Returns 404 when no webhook
/// secret is configured.
pub async fn push_event(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    info!("got push event");
    let secret = state
        .webhook_secret
        .as_ref()
        .ok_or_else(|| AppError::NotFound("webhook endpoint not configured".to_string()))?;

    let header = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_push_signature(secret.as_bytes(), &body, header).map_err(|e| {
        warn!(error = %e, "unable to validate payload");
        AppError::Forbidden(e.to_string())
    })?;

    let event = parse_push_event(&body).map_err(|e| {
        warn!(error = %e, "unable to unpack push event body");
        AppError::BadRequest(e.to_string())
    })?;
    let urls = event.remote_urls();
    if urls.is_empty() {
        warn!("no repository remote URL set on event");
        return Err(AppError::BadRequest(
            "no repository remote URL set".to_string(),
        ));
    }

    let checkout = urls
        .iter()
        .find_map(|url| state.directory.by_remote_url(url))
        .ok_or_else(|| {
            warn!(?urls, "cannot find checkout");
            AppError::BadRequest("cannot find checkout".to_string())
        })?
        .clone();

    let remote_url = checkout.remote_url().to_string();
    web::block(move || checkout.refresh())
        .await?
        .map_err(|e| {
            warn!(remote_url = %remote_url, error = %e, "cannot refresh repository");
            AppError::Internal(format!("cannot refresh repository: {e}"))
        })?;

    Ok(HttpResponse::Ok().body(format!("refreshed repository {remote_url}")))
}

/// Configure webhook routes
pub fn configure_webhook_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/public/github/webhook", web::post().to(push_event));
}
