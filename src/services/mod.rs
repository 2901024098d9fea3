pub mod auth;
pub mod checkout;
pub mod directory;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testutil;

pub use auth::{AccessGate, AuthError, SigninCredentials};
pub use checkout::{CheckoutError, FileStat, GitCheckout, RemoteCredential};
pub use directory::{CheckoutDirectory, DirectoryError};
pub use webhook::{PushEvent, WebhookError};
