//! PKCE (Proof Key for Code Exchange) helpers.
//!
//! - Code verifier: 64 random bytes, base64url without padding
//! - S256 code challenge derived with SHA-256
//! - State tokens: 32 random bytes, base64url without padding

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE challenge method constant.
pub const PKCE_METHOD: &str = "S256";

const VERIFIER_BYTES: usize = 64;
const STATE_BYTES: usize = 32;

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A fresh code verifier. Never repeats in practice.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token(VERIFIER_BYTES)
}

/// The S256 challenge for `verifier`. Deterministic.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// A fresh anti-CSRF state token.
#[must_use]
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

/// A verifier together with its challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    /// Kept secret until the code exchange.
    pub verifier: String,
    /// Sent in the authorization URL.
    pub challenge: String,
    pub method: &'static str,
}

impl Pkce {
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
            method: PKCE_METHOD,
        }
    }

    /// Check that `challenge` was derived from `verifier`.
    #[must_use]
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        generate_code_challenge(verifier) == challenge
    }
}
