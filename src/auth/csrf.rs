//! Signed double-submit CSRF tokens.
//!
//! A token is `nonce "." base64url(hmac_sha256(nonce ":" session_binding))`.
//! The binding is the raw session cookie, so a token minted for one session
//! is useless in another. Anonymous requests bind to a fixed placeholder.

use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;

use crate::config::SecurityConfig;

type HmacSha256 = Hmac<Sha256>;

/// Binding used when the request carries no session cookie.
pub const ANONYMOUS_BINDING: &str = "anonymous-session";

const NONCE_BYTES: usize = 32;
const MAX_TOKEN_LEN: usize = 256;

#[derive(Clone)]
pub struct CsrfSigner {
    key: Arc<[u8]>,
}

impl std::fmt::Debug for CsrfSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CsrfSigner {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: Arc::from(secret.as_bytes()),
        }
    }

    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(&config.secret_key)
    }

    /// Mint a fresh token bound to `session_binding`.
    pub fn issue(&self, session_binding: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = URL_SAFE_NO_PAD.encode(nonce_bytes);

        let mac = self
            .keyed(&nonce, session_binding)
            .map_err(|e| anyhow!("{e}"))?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{nonce}.{signature}"))
    }

    /// Whether `token` was minted by this key for `session_binding`.
    #[must_use]
    pub fn verify(&self, token: &str, session_binding: &str) -> bool {
        if token.len() > MAX_TOKEN_LEN {
            return false;
        }

        let Some((nonce, signature)) = token.rsplit_once('.') else {
            return false;
        };
        if nonce.is_empty() {
            return false;
        }

        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };

        self.keyed(nonce, session_binding)
            .is_ok_and(|mac| mac.verify_slice(&signature).is_ok())
    }

    fn keyed(
        &self,
        nonce: &str,
        session_binding: &str,
    ) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(&self.key)?;
        mac.update(nonce.as_bytes());
        mac.update(b":");
        mac.update(session_binding.as_bytes());
        Ok(mac)
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> CsrfSigner {
        CsrfSigner::new("csrf-test-secret")
    }

    #[test]
    fn issued_token_verifies_for_its_binding() {
        let signer = signer();
        let token = signer.issue("session-a").unwrap();
        assert!(signer.verify(&token, "session-a"));
    }

    #[test]
    fn token_is_bound_to_session() {
        let signer = signer();
        let token = signer.issue(ANONYMOUS_BINDING).unwrap();
        assert!(!signer.verify(&token, "session-a"));
    }

    #[test]
    fn tokens_are_unique() {
        let signer = signer();
        assert_ne!(signer.issue("s").unwrap(), signer.issue("s").unwrap());
    }

    #[test]
    fn other_key_rejects_token() {
        let token = signer().issue("s").unwrap();
        assert!(!CsrfSigner::new("another-secret").verify(&token, "s"));
    }

    #[test]
    fn malformed_tokens_rejected() {
        let signer = signer();
        for token in ["", "no-dot", ".sig", "nonce.!!!", "nonce."] {
            assert!(!signer.verify(token, "s"), "{token}");
        }
        assert!(!signer.verify(&"a".repeat(MAX_TOKEN_LEN + 1), "s"));
    }

    #[test]
    fn constant_time_eq_matches_equality() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokem"));
        assert!(!constant_time_eq(b"token", b"token-longer"));
    }
}
