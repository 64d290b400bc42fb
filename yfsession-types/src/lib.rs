//! Configuration records, proxy descriptors and the unified error type shared
//! across the yfsession workspace.
#![warn(missing_docs)]

mod config;
mod cookie;
mod error;
mod proxy;

pub use config::{ApiHosts, Credentials, ProxyPoolConfig, RetryConfig, SessionConfig};
pub use cookie::CookieRecord;
pub use error::{NetworkErrorKind, YfError};
pub use proxy::{ProxyDescriptor, ProxyProtocol, ProxyStats};
