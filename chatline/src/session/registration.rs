//! Retry state for the name registration handshake.

use super::SessionError;

/// Counts name submissions within one handshake.
///
/// The handshake ends only when the server sends `NAME_ACCEPTED`. Without a
/// limit the user may resubmit forever; with one, the attempt after the
/// limit fails with [`SessionError::NameAttemptsExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    attempts: u32,
    limit: Option<u32>,
}

impl Registration {
    /// Starts a handshake with an optional cap on name submissions.
    #[must_use]
    pub const fn new(limit: Option<u32>) -> Self {
        Self { attempts: 0, limit }
    }

    /// Records the start of another name submission and returns its number
    /// (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NameAttemptsExhausted`] once the limit has
    /// been used up.
    pub fn begin_attempt(&mut self) -> Result<u32, SessionError> {
        if let Some(limit) = self.limit
            && self.attempts >= limit
        {
            return Err(SessionError::NameAttemptsExhausted {
                attempts: self.attempts,
            });
        }
        self.attempts = self.attempts.saturating_add(1);
        Ok(self.attempts)
    }

    /// Names submitted so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}
