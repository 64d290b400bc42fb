//! Premium login collaborator.

use async_trait::async_trait;
use yfsession_types::{CookieRecord, Credentials};

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Logged in; these cookies carry the authenticated session.
    Success(Vec<CookieRecord>),
    /// Login failed for the given reason.
    Failure(String),
}

/// Obtains an authenticated cookie set for premium credentials.
///
/// Typically backed by browser automation, which lives outside this workspace.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Attempt a login.
    async fn login(&self, credentials: &Credentials) -> AuthOutcome;
}
