//! gitserve - serve file and directory contents from remote git repositories
//!
//! Keeps a local bare clone per configured repository, refreshed on demand
//! over HTTP or by push webhooks, and lets clients read files, directory
//! listings, and zip archives at any branch without their own clone.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

pub use config::{Config, ConfigError, RepositoryConfig};
pub use error::AppError;
pub use services::auth::{AccessGate, AuthError, SigninCredentials};
pub use services::checkout::{CheckoutError, FileStat, GitCheckout, RemoteCredential};
pub use services::directory::{CheckoutDirectory, DirectoryError};

/// Application state shared across handlers
pub struct AppState {
    /// The alias → checkout map, built once at startup
    pub directory: Arc<CheckoutDirectory>,
    /// Token issuance/verification for the public routes; `None` disables
    /// them
    pub access_gate: Option<AccessGate>,
    /// Shared secret for webhook signature verification; `None` disables the
    /// webhook endpoint
    pub webhook_secret: Option<String>,
}
