//! Transport seam between the session and the network.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use yfsession_types::{CookieRecord, ProxyDescriptor, ProxyProtocol, YfError};

/// HTTP verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// JSON document.
    Json(serde_json::Value),
}

/// A fully constructed request, ready to hand to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Verb.
    pub method: HttpMethod,
    /// Absolute URL without the query string.
    pub url: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Extra headers on top of the transport defaults.
    pub headers: Vec<(String, String)>,
    /// Payload.
    pub body: RequestBody,
}

impl HttpRequest {
    /// GET with no parameters.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// POST with the given body.
    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body,
        }
    }

    /// Append query parameters.
    #[must_use]
    pub fn with_query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Value of a query parameter, if present.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// What came back from the server, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    /// Headers in arrival order, names lower-cased.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// 2xx or 3xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status < 400
    }

    /// First value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into `Ok(self)` for success statuses, `YfError::Http` otherwise.
    ///
    /// # Errors
    /// Returns `YfError::Http` carrying status, headers and body when `status >= 400`.
    pub fn error_for_status(self) -> Result<Self, YfError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(YfError::Http {
                status: self.status,
                headers: self.headers,
                body: self.body,
            })
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `YfError::Parse` when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, YfError> {
        serde_json::from_str(&self.body).map_err(YfError::from)
    }
}

/// How a request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutboundConnector {
    /// Straight to the origin.
    Direct,
    /// Through an HTTP(S) proxy.
    HttpProxy(ProxyDescriptor),
    /// Through a SOCKS5 proxy.
    Socks5(ProxyDescriptor),
}

impl OutboundConnector {
    /// Select the connector for an optional proxy by its protocol.
    #[must_use]
    pub fn for_proxy(proxy: Option<&ProxyDescriptor>) -> Self {
        match proxy {
            None => Self::Direct,
            Some(p) => match p.protocol {
                ProxyProtocol::Http | ProxyProtocol::Https => Self::HttpProxy(p.clone()),
                ProxyProtocol::Socks5 => Self::Socks5(p.clone()),
            },
        }
    }

    /// The proxy this connector routes through, if any.
    #[must_use]
    pub const fn proxy(&self) -> Option<&ProxyDescriptor> {
        match self {
            Self::Direct => None,
            Self::HttpProxy(p) | Self::Socks5(p) => Some(p),
        }
    }
}

/// Issues requests on behalf of a session.
///
/// Implementations own the cookie store: every response's `Set-Cookie`
/// headers must be retained and replayed on later requests, whichever
/// connector carried them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request through `via`. Any HTTP status is `Ok`.
    ///
    /// # Errors
    /// Returns `YfError::Network` when no response was received.
    async fn send(&self, req: HttpRequest, via: &OutboundConnector) -> Result<HttpResponse, YfError>;

    /// Add cookies to the store as if the server had set them.
    ///
    /// # Errors
    /// Returns `YfError::InvalidArg` when a cookie cannot be stored.
    fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<(), YfError>;
}
