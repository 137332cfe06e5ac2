//! Admin password gate.

use sha2::{Digest, Sha256};

/// Password check guarding roster administration.
///
/// Only the SHA-256 digest of the password is kept in memory.
#[derive(Clone)]
pub struct AdminGate {
    digest: [u8; 32],
}

/// Proof that the admin password was presented. Required by every roster
/// mutation; only [`AdminGate::unlock`] can produce one.
#[derive(Debug)]
pub struct AdminSession {
    _private: (),
}

impl AdminGate {
    pub fn new(password: &str) -> Self {
        Self {
            digest: digest(password),
        }
    }

    /// Check `attempt` against the configured password.
    pub fn unlock(&self, attempt: &str) -> Option<AdminSession> {
        let candidate = digest(attempt);
        // Compare every byte regardless of where the first difference is.
        let diff = self
            .digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Some(AdminSession { _private: () })
        } else {
            tracing::warn!("admin login rejected");
            None
        }
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate").finish_non_exhaustive()
    }
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}
