use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Application-level error type.
///
/// Every failure maps to a plain-text body plus a status code so callers can
/// always distinguish "not found" from "bad request" from "server error".
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown repository, branch, path, or an empty archive
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed request payload
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid bearer token
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Rejected signature or credentials
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Fetch failure, corrupt local store, or an unexpected library error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        Self::Internal(err.to_string())
    }
}
