//! Test doubles for the yfsession workspace.
//!
//! [`ScriptedTransport`] stands in for the network: tests queue per-path
//! replies through a [`ScriptedController`] and inspect the recorded requests
//! afterwards. [`MockAuthenticator`] returns a fixed premium-login outcome.

mod auth;
mod transport;

pub use auth::MockAuthenticator;
pub use transport::{RecordedRequest, Reply, ScriptedController, ScriptedTransport};
