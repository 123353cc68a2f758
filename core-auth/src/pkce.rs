//! PKCE (RFC 7636) verifier and challenge generation.
//!
//! The verifier never leaves the process until the token exchange; only the
//! S256 challenge is placed in the authorization URL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated code verifiers (the RFC 7636 maximum).
pub const CODE_VERIFIER_LENGTH: usize = 128;

/// Source of PKCE verifiers and challenges.
///
/// Injected into [`AuthManager`](crate::AuthManager) so tests can pin the
/// verifier.
pub trait PkceUtils: Send + Sync {
    /// A fresh random code verifier.
    fn code_verifier(&self) -> String;

    /// The challenge sent in the authorization URL for `verifier`.
    fn code_challenge(&self, verifier: &str) -> String;
}

/// Default generator: alphanumeric verifier, S256 challenge.
///
/// # Examples
///
/// ```
/// use core_auth::pkce::{PkceUtils, S256Pkce};
///
/// let pkce = S256Pkce;
/// let verifier = pkce.code_verifier();
/// assert_eq!(verifier.len(), 128);
/// assert_eq!(pkce.code_challenge(&verifier), pkce.code_challenge(&verifier));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct S256Pkce;

impl PkceUtils for S256Pkce {
    fn code_verifier(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_VERIFIER_LENGTH)
            .map(char::from)
            .collect()
    }

    /// BASE64URL-NOPAD(SHA256(verifier))
    fn code_challenge(&self, verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}
