use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection-level failure categories reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NetworkErrorKind {
    /// The peer reset the connection.
    ConnectionReset,
    /// The peer (or proxy) refused the connection.
    ConnectionRefused,
    /// Connect or read timed out at the transport level.
    TimedOut,
    /// Host name resolution failed.
    DnsFailure,
    /// Writing to a closed socket.
    BrokenPipe,
    /// The outbound proxy could not establish the tunnel.
    ProxyConnect,
    /// Any other network-level failure.
    Other,
}

impl NetworkErrorKind {
    /// Short, stable code for logs and error messages.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConnectionReset => "ECONNRESET",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::TimedOut => "ETIMEDOUT",
            Self::DnsFailure => "ENOTFOUND",
            Self::BrokenPipe => "EPIPE",
            Self::ProxyConnect => "EPROXY",
            Self::Other => "ENETWORK",
        }
    }
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Unified error type for the yfsession workspace.
///
/// Transports produce `Network` and `Http`; response reshaping produces `Api`,
/// `Parse` and `Data`. Classification for retries is done by pattern matching
/// on these variants rather than by probing loosely typed fields.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum YfError {
    /// The request never produced an HTTP response.
    #[error("network error ({kind}): {message}")]
    Network {
        /// Failure category.
        kind: NetworkErrorKind,
        /// Transport-provided description.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("http status {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response headers in arrival order, names lower-cased.
        headers: Vec<(String, String)>,
        /// Response body as text (may be empty).
        body: String,
    },

    /// The upstream returned a structured error envelope.
    #[error("api error {code}: {description}")]
    Api {
        /// Provider error code, e.g. "Unauthorized" or "Not Found".
        code: String,
        /// Provider error description.
        description: String,
    },

    /// The response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with the returned data (missing fields, etc.).
    #[error("data issue: {0}")]
    Data(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl YfError {
    /// Helper: build a `Network` error.
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    /// Helper: build an `Http` error with no headers and an empty body.
    #[must_use]
    pub const fn status(status: u16) -> Self {
        Self::Http {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Helper: build an `Api` error from an envelope's code and description.
    pub fn api(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Helper: build an `InvalidArg` error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// First value of the named response header (case-insensitive), if this is an `Http` error.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            Self::Http { headers, .. } => headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for YfError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
