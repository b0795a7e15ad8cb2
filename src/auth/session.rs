//! Stateless signed session tokens.
//!
//! A token is `base64url(json(claims)) "." base64url(hmac_sha256(payload))`.
//! Nothing is stored server-side; rotating the secret invalidates every
//! outstanding token.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use super::AuthError;
use crate::config::SecurityConfig;

type HmacSha256 = Hmac<Sha256>;

const MAX_TOKEN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: i32,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Expires at, unix seconds
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionIssuer {
    key: Arc<[u8]>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("key", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: Arc::from(secret.as_bytes()),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            &config.secret_key,
            Duration::hours(i64::from(config.session_ttl_hours)),
        )
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user_id` with the configured lifetime.
    pub fn issue(&self, user_id: i32) -> Result<String> {
        self.issue_at(user_id, self.ttl, Utc::now())
    }

    pub fn issue_at(&self, user_id: i32, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: user_id,
            iat,
            exp: iat.saturating_add(ttl.num_seconds()),
        };

        let payload = serde_json::to_vec(&claims)?;
        let payload_part = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac().map_err(|e| anyhow!("{e}"))?;
        mac.update(payload_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload_part}.{sig_part}"))
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<i32, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<i32, AuthError> {
        self.decode_at(token, now).map(|claims| claims.sub)
    }

    /// Full claims of a verified token.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::MalformedToken);
        }

        let (payload_part, sig_part) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        if payload_part.is_empty() || sig_part.contains('.') {
            return Err(AuthError::MalformedToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|_| AuthError::MalformedToken)?;

        let mut mac = self.mac().map_err(|_| AuthError::MalformedToken)?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::MalformedToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| AuthError::MalformedToken)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)?;

        if now.timestamp() > claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(&self.key)
    }
}
