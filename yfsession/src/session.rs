use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;

use yfsession_core::{
    ApiHosts, AuthOutcome, Authenticator, Credentials, ErrorClass, HttpRequest, HttpResponse,
    OutboundConnector, ProxyPool, ProxyPoolConfig, ProxyStats, RequestBody, RetryCallback,
    RetryConfig, RetryPolicy, SessionConfig, Transport, YfError, classify, retry_with,
};

use crate::consent;
use crate::http::ReqwestTransport;
use crate::identity::BrowserIdentity;

/// Bootstrap progress of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been fetched yet.
    Uninitialized,
    /// The bootstrap handshake is running.
    Bootstrapping,
    /// Cookies (and possibly a token) are in place.
    Ready,
}

/// Per-call knobs for [`Session::execute`] and friends.
#[derive(Clone)]
pub struct RequestOptions {
    /// Extra query parameters.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Replaces the session's retry policy for this call.
    pub retry: Option<RetryConfig>,
    /// Observer for each scheduled retry.
    pub on_retry: Option<RetryCallback<YfError>>,
    /// Attach the current crumb as the `crumb` query parameter (default `true`).
    pub with_token: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            headers: Vec::new(),
            retry: None,
            on_retry: None,
            with_token: true,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("retry", &self.retry)
            .field("on_retry", &self.on_retry.is_some())
            .field("with_token", &self.with_token)
            .finish()
    }
}

impl RequestOptions {
    /// Defaults: session retry policy, token attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Use this retry policy instead of the session's.
    #[must_use]
    pub const fn retry(mut self, cfg: RetryConfig) -> Self {
        self.retry = Some(cfg);
        self
    }

    /// Observe retries of this call.
    #[must_use]
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&YfError, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Do not attach the crumb.
    #[must_use]
    pub const fn without_token(mut self) -> Self {
        self.with_token = false;
        self
    }
}

type TokenFuture = Shared<BoxFuture<'static, Option<String>>>;

struct MutableState {
    phase: SessionState,
    token: Option<String>,
    premium: bool,
    refresh: Option<(u64, TokenFuture)>,
    refresh_generation: u64,
}

/// Transport plus proxy pool.
///
/// A parked refresh future holds a clone of this, never an `Arc<Inner>`:
/// `Inner` owns that future through `MutableState::refresh`.
#[derive(Clone)]
struct Outbound {
    transport: Arc<dyn Transport>,
    pool: Option<Arc<Mutex<ProxyPool>>>,
}

impl Outbound {
    /// One attempt through the next proxy (if any), reporting the outcome to the pool.
    async fn send_once(&self, req: HttpRequest) -> Result<HttpResponse, YfError> {
        let proxy = self
            .pool
            .as_ref()
            .and_then(|p| p.lock().expect("mutex poisoned").next());
        let via = OutboundConnector::for_proxy(proxy.as_ref());

        let outcome = self
            .transport
            .send(req, &via)
            .await
            .and_then(HttpResponse::error_for_status);

        if let (Some(pool), Some(p)) = (&self.pool, &proxy) {
            let mut pool = pool.lock().expect("mutex poisoned");
            match &outcome {
                Ok(_) => pool.report_success(p),
                Err(e) if classify::is_proxy_failure(e) => pool.report_failure(p),
                Err(_) => {}
            }
        }
        outcome
    }

    async fn fetch_token(&self, crumb_url: String) -> Option<String> {
        match self.send_once(HttpRequest::get(crumb_url)).await {
            Ok(resp) => consent::crumb_from_body(&resp.body),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "crumb fetch failed");
                None
            }
        }
    }
}

struct Inner {
    config: SessionConfig,
    outbound: Outbound,
    authenticator: Option<Arc<dyn Authenticator>>,
    identity: &'static BrowserIdentity,
    state: Mutex<MutableState>,
    bootstrap: tokio::sync::Mutex<()>,
}

/// Cookie-, token- and proxy-aware HTTP session against the upstream API.
///
/// Cheap to clone; clones share cookies, token and proxy health.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("identity", &self.inner.identity.name)
            .field("premium", &self.is_premium())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    transport: Option<Arc<dyn Transport>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    identity: Option<&'static BrowserIdentity>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Builder with [`SessionConfig::default`], the reqwest transport and a random identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            transport: None,
            authenticator: None,
            identity: None,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Default retry policy for every request.
    #[must_use]
    pub const fn retry(mut self, cfg: RetryConfig) -> Self {
        self.config.retry = cfg;
        self
    }

    /// Route requests through a rotating proxy pool.
    ///
    /// Behavior and trade-offs:
    /// - Each attempt (bootstrap included) takes the next healthy proxy.
    /// - Only failures that look proxy-caused count against a proxy; HTTP
    ///   errors from the origin do not.
    /// - When every proxy is unhealthy the pool forgives all of them at once
    ///   rather than pausing traffic.
    #[must_use]
    pub fn proxies(mut self, cfg: ProxyPoolConfig) -> Self {
        self.config.proxy = Some(cfg);
        self
    }

    /// Premium credentials, used only together with an [`Authenticator`].
    #[must_use]
    pub fn premium(mut self, credentials: Credentials) -> Self {
        self.config.premium = Some(credentials);
        self
    }

    /// Upstream locations.
    #[must_use]
    pub fn hosts(mut self, hosts: ApiHosts) -> Self {
        self.config.hosts = hosts;
        self
    }

    /// Transport-level timeout for every call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Use a custom transport instead of [`ReqwestTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Collaborator performing the premium login.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Pin the browser identity instead of picking one at random.
    #[must_use]
    pub const fn identity(mut self, identity: &'static BrowserIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Build the session. No network traffic happens until the first request
    /// or an explicit [`Session::initialize`].
    ///
    /// # Errors
    /// Returns `InvalidArg` for out-of-range retry or proxy settings, or when
    /// the default transport cannot be constructed.
    pub fn build(self) -> Result<Session, YfError> {
        validate_retry(&self.config.retry)?;
        if let Some(p) = &self.config.proxy
            && p.max_failures == 0
        {
            return Err(YfError::invalid_arg("proxy max_failures must be at least 1"));
        }

        let identity = self.identity.unwrap_or_else(BrowserIdentity::random);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(identity, self.config.timeout)?),
        };
        let pool = self
            .config
            .proxy
            .as_ref()
            .map(|cfg| Arc::new(Mutex::new(ProxyPool::from_config(cfg))));

        Ok(Session {
            inner: Arc::new(Inner {
                config: self.config,
                outbound: Outbound { transport, pool },
                authenticator: self.authenticator,
                identity,
                state: Mutex::new(MutableState {
                    phase: SessionState::Uninitialized,
                    token: None,
                    premium: false,
                    refresh: None,
                    refresh_generation: 0,
                }),
                bootstrap: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

fn validate_retry(cfg: &RetryConfig) -> Result<(), YfError> {
    if !cfg.factor.is_finite() || cfg.factor < 1.0 {
        return Err(YfError::invalid_arg(format!("retry factor must be >= 1.0, got {}", cfg.factor)));
    }
    if !(0.0..=1.0).contains(&cfg.jitter_factor) {
        return Err(YfError::invalid_arg(format!(
            "retry jitter_factor must be within [0, 1], got {}",
            cfg.jitter_factor
        )));
    }
    Ok(())
}

impl Session {
    /// Start building a session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Session with the given configuration and the default transport.
    ///
    /// # Errors
    /// See [`SessionBuilder::build`].
    pub fn new(config: SessionConfig) -> Result<Self, YfError> {
        SessionBuilder::new().config(config).build()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MutableState) -> R) -> R {
        let mut guard = self.inner.state.lock().expect("mutex poisoned");
        f(&mut guard)
    }

    /// Current bootstrap state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.with_state(|s| s.phase)
    }

    /// Current crumb, if one was obtained.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.with_state(|s| s.token.clone())
    }

    /// Whether the premium login succeeded.
    #[must_use]
    pub fn is_premium(&self) -> bool {
        self.with_state(|s| s.premium)
    }

    /// The browser identity chosen at construction.
    #[must_use]
    pub fn identity(&self) -> &'static BrowserIdentity {
        self.inner.identity
    }

    /// Configuration the session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Health snapshot of the proxy pool, when one is configured.
    #[must_use]
    pub fn proxy_stats(&self) -> Option<Vec<ProxyStats>> {
        self.inner
            .outbound
            .pool
            .as_ref()
            .map(|p| p.lock().expect("mutex poisoned").stats())
    }

    /// Run the bootstrap handshake once. Later calls return immediately.
    ///
    /// Premium login, consent and token fetch are each best-effort: failures
    /// are logged and the session still becomes [`SessionState::Ready`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "yfsession::session::initialize", skip(self))
    )]
    pub async fn initialize(&self) {
        if self.state() == SessionState::Ready {
            return;
        }
        let _gate = self.inner.bootstrap.lock().await;
        if self.state() == SessionState::Ready {
            return;
        }
        self.with_state(|s| s.phase = SessionState::Bootstrapping);

        self.premium_login().await;
        self.accept_consent().await;
        let token = self.fetch_token().await;

        #[cfg(feature = "tracing")]
        tracing::debug!(token_obtained = token.is_some(), "session bootstrap finished");

        self.with_state(|s| {
            s.token = token;
            s.phase = SessionState::Ready;
        });
    }

    async fn premium_login(&self) {
        let (Some(credentials), Some(auth)) = (&self.inner.config.premium, &self.inner.authenticator)
        else {
            return;
        };
        match auth.login(credentials).await {
            AuthOutcome::Success(cookies) => match self.inner.outbound.transport.inject_cookies(&cookies) {
                Ok(()) => self.with_state(|s| s.premium = true),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_e, "premium cookies rejected; continuing unauthenticated");
                }
            },
            AuthOutcome::Failure(_reason) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(reason = %_reason, "premium login failed; continuing unauthenticated");
            }
        }
    }

    async fn accept_consent(&self) {
        let hosts = &self.inner.config.hosts;
        let landing = match self.send_once(HttpRequest::get(hosts.landing_url.clone())).await {
            Ok(resp) => resp,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "landing page fetch failed");
                return;
            }
        };
        if !landing.url.contains(&hosts.consent_marker) {
            return;
        }
        let Some(form) = consent::parse_consent_form(&landing.body) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(url = %landing.url, "consent page without a recognizable form");
            return;
        };

        let fields = consent::consent_fields(&form, &hosts.landing_url);
        let submit = HttpRequest::post(hosts.consent_submit_url.clone(), RequestBody::Form(fields))
            .with_query([("sessionId", form.session_id.clone())]);
        if let Err(_e) = self.send_once(submit).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "consent submission failed");
        }
    }

    async fn fetch_token(&self) -> Option<String> {
        let crumb_url = self.inner.config.hosts.crumb_url.clone();
        self.inner.outbound.fetch_token(crumb_url).await
    }

    /// Fetch a fresh crumb and store it.
    ///
    /// Concurrent callers share one in-flight fetch and all observe its result.
    pub async fn refresh_token(&self) -> Option<String> {
        let (generation, pending) = self.with_state(|s| {
            if let Some((generation, pending)) = &s.refresh {
                return (*generation, pending.clone());
            }
            s.refresh_generation += 1;
            let outbound = self.inner.outbound.clone();
            let crumb_url = self.inner.config.hosts.crumb_url.clone();
            let pending = async move { outbound.fetch_token(crumb_url).await }
                .boxed()
                .shared();
            s.refresh = Some((s.refresh_generation, pending.clone()));
            (s.refresh_generation, pending)
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(generation, "awaiting token refresh");

        let token = pending.await;
        self.with_state(|s| {
            if s.refresh.as_ref().is_some_and(|(g, _)| *g == generation) {
                s.refresh = None;
                s.token.clone_from(&token);
            }
        });
        token
    }

    fn prepare(&self, base: &HttpRequest, opts: &RequestOptions) -> HttpRequest {
        let mut req = base.clone();
        req.query.extend(opts.query.iter().cloned());
        req.headers.extend(opts.headers.iter().cloned());
        if opts.with_token
            && let Some(token) = self.token()
        {
            req.query.retain(|(k, _)| k != "crumb");
            req.query.push(("crumb".to_string(), token));
        }
        req
    }

    async fn send_once(&self, req: HttpRequest) -> Result<HttpResponse, YfError> {
        self.inner.outbound.send_once(req).await
    }

    /// Send `req` with lazy bootstrap, crumb attachment and retries.
    ///
    /// An invalid-token failure refreshes the crumb before the next attempt;
    /// rate-limited failures honor `Retry-After`.
    ///
    /// # Errors
    /// `InvalidArg` when the per-call retry override is out of range;
    /// otherwise the last attempt's error once retries are exhausted, or the
    /// first non-retryable error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "yfsession::session::execute",
            skip(self, req, opts),
            fields(url = %req.url),
        )
    )]
    pub async fn execute(&self, req: HttpRequest, opts: RequestOptions) -> Result<HttpResponse, YfError> {
        let cfg = match opts.retry {
            Some(cfg) => {
                validate_retry(&cfg)?;
                cfg
            }
            None => self.inner.config.retry,
        };
        self.initialize().await;

        let attempt = |_: u32| self.send_once(self.prepare(&req, &opts));
        if !cfg.enabled {
            return attempt(0).await;
        }

        let policy = RetryPolicy::new(cfg, |e: &YfError| {
            classify::is_retryable(e) || classify::is_invalid_token(e)
        })
        .delay_override(|e| classify::retry_after_ms(e).map(Duration::from_millis))
        .on_retry_shared(opts.on_retry.clone());

        retry_with(&policy, attempt, |err, _retry, _delay| {
            let class = classify::classify(err);
            #[cfg(feature = "tracing")]
            match class {
                ErrorClass::RateLimited => tracing::warn!(
                    retry = _retry,
                    delay_ms = u64::try_from(_delay.as_millis()).unwrap_or(u64::MAX),
                    retry_after_ms = ?classify::retry_after_ms(err),
                    "rate limited; backing off"
                ),
                _ => tracing::debug!(retry = _retry, class = ?class, error = %err, "retrying"),
            }
            async move {
                if class == ErrorClass::InvalidToken {
                    self.refresh_token().await;
                }
            }
        })
        .await
    }

    /// GET `url`.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn get(&self, url: &str, opts: RequestOptions) -> Result<HttpResponse, YfError> {
        self.execute(HttpRequest::get(url), opts).await
    }

    /// POST `body` to `url`.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub async fn post(
        &self,
        url: &str,
        body: RequestBody,
        opts: RequestOptions,
    ) -> Result<HttpResponse, YfError> {
        self.execute(HttpRequest::post(url, body), opts).await
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// # Errors
    /// See [`Session::execute`]; `Parse` when the body does not decode.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, opts: RequestOptions) -> Result<T, YfError> {
        self.get(url, opts).await?.json()
    }

    /// POST `body` to `url` and decode the response as JSON.
    ///
    /// # Errors
    /// See [`Session::execute`]; `Parse` when the body does not decode.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: RequestBody,
        opts: RequestOptions,
    ) -> Result<T, YfError> {
        self.post(url, body, opts).await?.json()
    }
}
