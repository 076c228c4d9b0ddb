/*
 * Responsibility
 * - The authenticated caller as seen by the access decision
 * - Built only by the token authenticator, from a verified, unexpired token
 * - Lives for a single request; never persisted
 */
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub role: String,
    /// `exp` claim, epoch seconds.
    pub expires_at: i64,
    token: String,
}

impl Identity {
    pub(crate) fn new(subject: String, role: String, expires_at: i64, token: String) -> Self {
        Self {
            subject,
            role,
            expires_at,
            token,
        }
    }

    /// The bearer token this identity was derived from.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the raw token
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
