//! Failure classification for retries, token refresh and proxy health.
//!
//! Every predicate is a match over [`YfError`] variants; free-text checks
//! only look at the message-bearing variants.

use chrono::{DateTime, NaiveDateTime, Utc};
use yfsession_types::{NetworkErrorKind, YfError};

/// Coarse failure category, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// HTTP 429 or an equivalent "too many requests" signal.
    RateLimited,
    /// Server-side or network failure likely to clear up on its own.
    Transient,
    /// The anti-forgery token was rejected; refresh before retrying.
    InvalidToken,
    /// Everything else.
    NonRetryable,
}

const TRANSIENT_PHRASES: &[&str] = &[
    "socket hang up",
    "network error",
    "connection reset",
    "connection refused",
    "timed out",
    "timeout",
    "econnreset",
    "econnrefused",
    "etimedout",
    "enotfound",
    "eai_again",
    "epipe",
];

const INVALID_TOKEN_PHRASES: &[&str] = &["invalid crumb", "unauthorized"];

const PROXY_PHRASES: &[&str] = &["proxy", "tunnel", "socket hang up"];

fn free_text(err: &YfError) -> Option<String> {
    match err {
        YfError::Network { message, .. }
        | YfError::Parse(message)
        | YfError::Data(message)
        | YfError::Other(message) => Some(message.to_ascii_lowercase()),
        YfError::Api { code, description } => {
            Some(format!("{code} {description}").to_ascii_lowercase())
        }
        YfError::Http { body, .. } => Some(body.to_ascii_lowercase()),
        YfError::InvalidArg(_) => None,
        _ => None,
    }
}

/// Pull `{code, description}` out of a JSON error envelope.
///
/// Accepts both `{"error": {...}}` and the nested `{"<root>": {"error": {...}}}` shape.
#[must_use]
pub fn error_envelope(body: &str) -> Option<(String, String)> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let obj = value.as_object()?;
    let error = obj
        .get("error")
        .filter(|e| e.is_object())
        .or_else(|| {
            obj.values()
                .filter_map(|v| v.get("error"))
                .find(|e| e.is_object())
        })?;
    let field = |k: &str| {
        error
            .get(k)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some((field("code"), field("description")))
}

/// HTTP 429, or a code/message saying "too many requests".
#[must_use]
pub fn is_rate_limited(err: &YfError) -> bool {
    if err.http_status() == Some(429) {
        return true;
    }
    free_text(err).is_some_and(|m| m.contains("too many requests"))
}

/// Rate limits, 5xx, 408, known network failure kinds, or known transient phrases.
#[must_use]
pub fn is_transient(err: &YfError) -> bool {
    if is_rate_limited(err) {
        return true;
    }
    match err {
        YfError::Http { status, .. } => *status == 408 || (500..600).contains(status),
        // Every transport-level failure kind is worth another attempt.
        YfError::Network { .. } => true,
        YfError::Parse(_) | YfError::Data(_) | YfError::Other(_) | YfError::Api { .. } => {
            free_text(err).is_some_and(|m| TRANSIENT_PHRASES.iter().any(|p| m.contains(p)))
        }
        _ => false,
    }
}

/// The upstream rejected the anti-forgery token.
#[must_use]
pub fn is_invalid_token(err: &YfError) -> bool {
    let envelope_says_so = |code: &str, description: &str| {
        code.eq_ignore_ascii_case("unauthorized") || description.to_ascii_lowercase().contains("crumb")
    };
    let text_says_so = |text: &str| {
        let m = text.to_ascii_lowercase();
        INVALID_TOKEN_PHRASES.iter().any(|p| m.contains(p))
    };
    match err {
        YfError::Api { code, description } => envelope_says_so(code, description),
        YfError::Http { body, .. } => match error_envelope(body) {
            Some((code, description)) => envelope_says_so(&code, &description),
            None => text_says_so(body),
        },
        YfError::Other(msg) | YfError::Data(msg) => text_says_so(msg),
        _ => false,
    }
}

/// Blind retry is allowed: rate limited or transient.
///
/// Token failures are deliberately excluded; the session refreshes the token
/// before retrying those.
#[must_use]
pub fn is_retryable(err: &YfError) -> bool {
    is_rate_limited(err) || is_transient(err)
}

/// Whether a failure should count against the proxy that carried the request.
#[must_use]
pub fn is_proxy_failure(err: &YfError) -> bool {
    match err {
        YfError::Network { kind, message } => {
            matches!(
                kind,
                NetworkErrorKind::ConnectionRefused
                    | NetworkErrorKind::ConnectionReset
                    | NetworkErrorKind::TimedOut
                    | NetworkErrorKind::ProxyConnect
            ) || {
                let m = message.to_ascii_lowercase();
                PROXY_PHRASES.iter().any(|p| m.contains(p))
            }
        }
        YfError::Http { status, .. } => *status == 407,
        YfError::Other(msg) => {
            let m = msg.to_ascii_lowercase();
            PROXY_PHRASES.iter().any(|p| m.contains(p))
        }
        _ => false,
    }
}

/// Single-label classification, rate limits first.
#[must_use]
pub fn classify(err: &YfError) -> ErrorClass {
    if is_rate_limited(err) {
        ErrorClass::RateLimited
    } else if is_invalid_token(err) {
        ErrorClass::InvalidToken
    } else if is_transient(err) {
        ErrorClass::Transient
    } else {
        ErrorClass::NonRetryable
    }
}

/// Parse a `Retry-After` value (delta-seconds or HTTP-date) relative to `now`.
///
/// Returns `None` when the value is malformed. Dates in the past yield `Some(0)`.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if v.bytes().all(|b| b.is_ascii_digit()) {
        return v.parse::<u64>().ok().map(|s| s.saturating_mul(1000));
    }
    let when = parse_http_date(v)?;
    let ms = (when - now).num_milliseconds();
    Some(u64::try_from(ms).unwrap_or(0))
}

fn parse_http_date(v: &str) -> Option<DateTime<Utc>> {
    // IMF-fixdate: "Sun, 06 Nov 1994 08:49:37 GMT"
    if let Ok(dt) = DateTime::parse_from_rfc2822(v) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC 850: "Sunday, 06-Nov-94 08:49:37 GMT"; asctime: "Sun Nov  6 08:49:37 1994"
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(v, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Server-supplied delay hint carried by an `Http` error, in milliseconds.
///
/// Repeated headers use the first value.
#[must_use]
pub fn retry_after_ms(err: &YfError) -> Option<u64> {
    parse_retry_after(err.header("retry-after")?, Utc::now())
}
