//! yfsession-core
//!
//! Resilience primitives and seams shared across the yfsession workspace.
//!
//! - `backoff`: pure delay calculation with optional jitter and server hints.
//! - `classify`: rate-limit / transient / invalid-token / proxy-failure predicates
//!   and `Retry-After` parsing.
//! - `retry`: generic async retry driver.
//! - `pool`: round-robin proxy rotation with health tracking.
//! - `transport` / `auth`: traits the session is built on.
//!
//! Async runtime (Tokio)
//! ---------------------
//! The retry driver sleeps with `tokio::time::sleep` and the proxy pool reads
//! `tokio::time::Instant`, so both follow a paused Tokio clock in tests.
#![warn(missing_docs)]

/// Authentication collaborator trait.
pub mod auth;
/// Backoff delay calculation.
pub mod backoff;
/// Failure classification.
pub mod classify;
/// Proxy rotation.
pub mod pool;
/// Retry driver.
pub mod retry;
/// Transport trait and request/response records.
pub mod transport;

pub use auth::{AuthOutcome, Authenticator};
pub use classify::ErrorClass;
pub use pool::ProxyPool;
pub use retry::{RetryCallback, RetryPolicy, retry, retry_with};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, OutboundConnector, RequestBody, Transport,
};
pub use yfsession_types::*;
