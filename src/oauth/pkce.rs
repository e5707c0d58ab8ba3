use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

// RFC 7636 allows 43-128 verifier characters; 64 random bytes encode to 86.
const VERIFIER_ENTROPY_BYTES: usize = 64;
const STATE_ENTROPY_BYTES: usize = 32;
const MAX_VERIFIER_LEN: usize = 128;

/// Secret material for one authentication attempt. Never persisted;
/// discarded after the code exchange.
pub struct PkceMaterial {
    pub verifier: String,
    pub challenge: String,
    /// CSRF-binding token echoed back by the provider. Independent of the
    /// verifier by construction.
    pub state: String,
}

pub fn generate_pkce() -> PkceMaterial {
    let mut verifier = random_urlsafe(VERIFIER_ENTROPY_BYTES);
    verifier.truncate(MAX_VERIFIER_LEN);
    let challenge = code_challenge(&verifier);
    let state = random_urlsafe(STATE_ENTROPY_BYTES);

    PkceMaterial {
        verifier,
        challenge,
        state,
    }
}

/// S256 transform: base64url(SHA-256(verifier)) without padding.
pub fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn random_urlsafe(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
