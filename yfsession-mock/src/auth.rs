use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use yfsession_core::{AuthOutcome, Authenticator, Credentials};

/// Authenticator that returns a fixed outcome and counts logins.
pub struct MockAuthenticator {
    outcome: AuthOutcome,
    calls: Arc<AtomicUsize>,
}

impl MockAuthenticator {
    /// Always answer with `outcome`.
    #[must_use]
    pub fn new(outcome: AuthOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared login counter, readable after the authenticator is moved into a session.
    #[must_use]
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn login(&self, _credentials: &Credentials) -> AuthOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
