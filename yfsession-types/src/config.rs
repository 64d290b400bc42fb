//! Configuration records shared by the session, retry engine and proxy pool.
//!
//! There is no process-wide cached configuration: build a [`SessionConfig`]
//! once (by hand or via [`SessionConfig::from_env`]) and hand it to whatever
//! constructs the session.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::YfError;
use crate::proxy::ProxyDescriptor;

/// Caller-facing retry policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// When false, each request is attempted exactly once.
    pub enabled: bool,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay, including server-supplied hints.
    pub max_delay: Duration,
    /// Exponential growth factor applied per attempt (>= 1.0).
    pub factor: f64,
    /// Apply randomized jitter to each delay.
    pub jitter: bool,
    /// Jitter amplitude in `[0, 1]`: the delay is scaled by `1 ± jitter_factor`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            factor: 2.0,
            jitter: true,
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Proxy rotation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyPoolConfig {
    /// Proxies in rotation order.
    pub proxies: Vec<ProxyDescriptor>,
    /// Consecutive failures after which a proxy is skipped.
    pub max_failures: u32,
    /// How long a failing proxy is skipped before it is tried again.
    pub cooldown: Duration,
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            max_failures: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Premium account credentials handed to the authentication collaborator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account user name (usually an e-mail address).
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Convenience constructor.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Upstream locations used by the bootstrap handshake and the endpoint catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHosts {
    /// Landing page visited first to collect session cookies.
    pub landing_url: String,
    /// Substring identifying a consent/interstitial redirect target.
    pub consent_marker: String,
    /// Consent form submission URL (`sessionId` is appended as a query parameter).
    pub consent_submit_url: String,
    /// Endpoint returning the anti-forgery token as plain text.
    pub crumb_url: String,
    /// Base URL of the primary API host.
    pub query1: String,
    /// Base URL of the secondary API host.
    pub query2: String,
}

impl Default for ApiHosts {
    fn default() -> Self {
        Self {
            landing_url: "https://finance.yahoo.com/".to_string(),
            consent_marker: "consent.".to_string(),
            consent_submit_url: "https://consent.yahoo.com/v2/collectConsent".to_string(),
            crumb_url: "https://query1.finance.yahoo.com/v1/test/getcrumb".to_string(),
            query1: "https://query1.finance.yahoo.com".to_string(),
            query2: "https://query2.finance.yahoo.com".to_string(),
        }
    }
}

impl ApiHosts {
    /// Point every location at a single base URL (useful with a local mock server).
    #[must_use]
    pub fn single_origin(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            landing_url: format!("{base}/"),
            consent_marker: "/consent".to_string(),
            consent_submit_url: format!("{base}/v2/collectConsent"),
            crumb_url: format!("{base}/v1/test/getcrumb"),
            query1: base.to_string(),
            query2: base.to_string(),
        }
    }
}

/// Everything needed to construct a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Default retry policy for session requests.
    pub retry: RetryConfig,
    /// Optional proxy rotation; `None` means direct connections.
    pub proxy: Option<ProxyPoolConfig>,
    /// Optional premium credentials.
    pub premium: Option<Credentials>,
    /// Transport-level timeout applied to every call, bootstrap included.
    pub timeout: Duration,
    /// Upstream locations.
    pub hosts: ApiHosts,
    /// `lang` query parameter default.
    pub lang: String,
    /// `region` query parameter default.
    pub region: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            proxy: None,
            premium: None,
            timeout: Duration::from_secs(30),
            hosts: ApiHosts::default(),
            lang: "en-US".to_string(),
            region: "US".to_string(),
        }
    }
}

impl SessionConfig {
    /// Read overrides from the process environment.
    ///
    /// # Errors
    /// Returns `YfError::InvalidArg` naming the variable when a value cannot be parsed.
    pub fn from_env() -> Result<Self, YfError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read overrides through an arbitrary lookup function.
    ///
    /// Recognized keys: `YF_RETRY_ENABLED`, `YF_MAX_RETRIES`,
    /// `YF_RETRY_INITIAL_DELAY_MS`, `YF_RETRY_MAX_DELAY_MS`, `YF_RETRY_FACTOR`,
    /// `YF_RETRY_JITTER`, `YF_RETRY_JITTER_FACTOR`, `YF_PROXIES`,
    /// `YF_PROXY_MAX_FAILURES`, `YF_PROXY_COOLDOWN_MS`, `YF_TIMEOUT_MS`,
    /// `YF_USERNAME`, `YF_PASSWORD`.
    ///
    /// # Errors
    /// Returns `YfError::InvalidArg` naming the variable when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, YfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("YF_RETRY_ENABLED") {
            cfg.retry.enabled = parse_bool("YF_RETRY_ENABLED", &v)?;
        }
        if let Some(v) = get("YF_MAX_RETRIES") {
            cfg.retry.max_retries = parse_num("YF_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("YF_RETRY_INITIAL_DELAY_MS") {
            cfg.retry.initial_delay = Duration::from_millis(parse_num("YF_RETRY_INITIAL_DELAY_MS", &v)?);
        }
        if let Some(v) = get("YF_RETRY_MAX_DELAY_MS") {
            cfg.retry.max_delay = Duration::from_millis(parse_num("YF_RETRY_MAX_DELAY_MS", &v)?);
        }
        if let Some(v) = get("YF_RETRY_FACTOR") {
            let factor: f64 = parse_num("YF_RETRY_FACTOR", &v)?;
            if !factor.is_finite() || factor < 1.0 {
                return Err(invalid("YF_RETRY_FACTOR", &v));
            }
            cfg.retry.factor = factor;
        }
        if let Some(v) = get("YF_RETRY_JITTER") {
            cfg.retry.jitter = parse_bool("YF_RETRY_JITTER", &v)?;
        }
        if let Some(v) = get("YF_RETRY_JITTER_FACTOR") {
            let jf: f64 = parse_num("YF_RETRY_JITTER_FACTOR", &v)?;
            if !(0.0..=1.0).contains(&jf) {
                return Err(invalid("YF_RETRY_JITTER_FACTOR", &v));
            }
            cfg.retry.jitter_factor = jf;
        }

        if let Some(v) = get("YF_PROXIES") {
            let mut pool = ProxyPoolConfig::default();
            for entry in v.split([',', '\n']).map(str::trim) {
                if entry.is_empty() || entry.starts_with('#') {
                    continue;
                }
                pool.proxies.push(entry.parse().map_err(|_| invalid("YF_PROXIES", entry))?);
            }
            cfg.proxy = Some(pool);
        }
        if let Some(v) = get("YF_PROXY_MAX_FAILURES") {
            let n = parse_num("YF_PROXY_MAX_FAILURES", &v)?;
            cfg.proxy.get_or_insert_with(ProxyPoolConfig::default).max_failures = n;
        }
        if let Some(v) = get("YF_PROXY_COOLDOWN_MS") {
            let ms = parse_num("YF_PROXY_COOLDOWN_MS", &v)?;
            cfg.proxy.get_or_insert_with(ProxyPoolConfig::default).cooldown = Duration::from_millis(ms);
        }

        if let Some(v) = get("YF_TIMEOUT_MS") {
            cfg.timeout = Duration::from_millis(parse_num("YF_TIMEOUT_MS", &v)?);
        }

        match (get("YF_USERNAME"), get("YF_PASSWORD")) {
            (Some(user), Some(pass)) => cfg.premium = Some(Credentials::new(user, pass)),
            (None, None) => {}
            (Some(_), None) => return Err(YfError::invalid_arg("YF_USERNAME set without YF_PASSWORD")),
            (None, Some(_)) => return Err(YfError::invalid_arg("YF_PASSWORD set without YF_USERNAME")),
        }

        Ok(cfg)
    }
}

fn invalid(key: &str, value: &str) -> YfError {
    YfError::invalid_arg(format!("{key}: cannot parse {value:?}"))
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, YfError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, YfError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
