//! Admin secrets and session-creation credentials.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::AuthError;

/// Random bytes in a fresh admin secret.
pub const ADMIN_SECRET_BYTES: usize = 35;

/// Generate a URL-safe admin secret.
pub fn generate_admin_secret() -> String {
    let mut bytes = [0u8; ADMIN_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Compare two secrets through their SHA-256 digests.
///
/// Both sides are always 32 bytes, so neither length nor common prefix of
/// the real secret shows up in timing.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let provided = Sha256::digest(provided.as_bytes());
    constant_time_eq(&expected, &provided)
}

/// Decides whether a user may create new sessions.
pub trait Authenticator: Send + Sync {
    /// Check `user` / `password`. `Ok(false)` means rejected.
    fn authenticate(&self, user: &str, password: &str) -> Result<bool, AuthError>;
}

/// Fixed username → password table from settings.
#[derive(Clone, Default)]
pub struct CredentialTable {
    entries: BTreeMap<String, String>,
}

impl CredentialTable {
    /// Build from a settings map.
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Number of configured users.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no user is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CredentialTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTable")
            .field("users", &self.entries.len())
            .finish()
    }
}

impl Authenticator for CredentialTable {
    fn authenticate(&self, user: &str, password: &str) -> Result<bool, AuthError> {
        match self.entries.get(user) {
            Some(expected) => Ok(secrets_match(expected, password)),
            None => {
                // Unknown users still pay for a comparison.
                let _ = secrets_match("", password);
                Ok(false)
            }
        }
    }
}
