//! Access gate.
//!
//! Exchanges sign-in credentials for signed, time-boxed bearer tokens and
//! verifies them statelessly. Tokens gate the `/public/*` content routes so
//! flagged repositories can be read without server-side credentials.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur during sign-in and token verification
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password did not match
    #[error("incorrect credentials")]
    InvalidCredentials,

    /// Token is malformed or its signature does not verify
    #[error("invalid token")]
    InvalidToken,

    /// Token signature verified but its expiry has passed
    #[error("token expired")]
    TokenExpired,
}

/// Sign-in credentials loaded from configuration
#[derive(Debug, Clone)]
pub struct SigninCredentials {
    pub username: String,
    /// SHA256 hash of the password, hex-encoded
    pub password_hash: String,
}

impl SigninCredentials {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Hash a password using SHA256
    pub fn hash_password(password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }

    /// Verify a password against the stored hash
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let provided_hash = Self::hash_password(password);
        // Constant-time comparisons to prevent timing attacks
        constant_time_eq(username, &self.username) & constant_time_eq(&provided_hash, &self.password_hash)
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Issues and verifies bearer tokens.
///
/// A token is `base64url(username:expiry_unix) . hex(hmac_sha256(secret,
/// payload))`; verification recomputes the signature and checks the expiry,
/// so no server-side session state is kept.
#[derive(Clone)]
pub struct AccessGate {
    credentials: SigninCredentials,
    secret: Vec<u8>,
    token_ttl: Duration,
}

impl AccessGate {
    pub fn new(
        credentials: SigninCredentials,
        secret: impl Into<Vec<u8>>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            credentials,
            secret: secret.into(),
            token_ttl,
        }
    }

    /// Exchange credentials for a token.
    pub fn sign_in(&self, username: &str, password: &str) -> Result<String, AuthError> {
        if !self.credentials.verify(username, password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.issue(username))
    }

    /// Issue a token for `username` expiring after the configured lifetime.
    pub fn issue(&self, username: &str) -> String {
        let expires_at = (Utc::now() + self.token_ttl).timestamp();
        let payload = format!("{username}:{expires_at}");
        let signature = self.sign(payload.as_bytes());
        format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), hex::encode(signature))
    }

    /// Verify a token, returning the username it was issued for.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let (payload_b64, signature_hex) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let signature = hex::decode(signature_hex).map_err(|_| AuthError::InvalidToken)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC key should be valid");
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = String::from_utf8(payload).map_err(|_| AuthError::InvalidToken)?;
        let (username, expires_at) = payload.rsplit_once(':').ok_or(AuthError::InvalidToken)?;
        let expires_at: i64 = expires_at.parse().map_err(|_| AuthError::InvalidToken)?;
        if Utc::now().timestamp() > expires_at {
            return Err(AuthError::TokenExpired);
        }
        Ok(username.to_string())
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC key should be valid");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
