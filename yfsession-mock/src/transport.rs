use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use yfsession_core::{
    CookieRecord, HttpRequest, HttpResponse, NetworkErrorKind, OutboundConnector, Transport,
    YfError,
};

/// Instruction for how one request to a path should be answered.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this response. An empty `url` is filled with the request URL.
    Respond(HttpResponse),
    /// Fail as if no response arrived.
    Fail(YfError),
    /// Wait, then behave like the inner reply.
    Delay(Duration, Box<Reply>),
    /// Never answer (simulate a stall).
    Hang,
}

impl Reply {
    /// `200` with a text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    /// `200` with a JSON body.
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::Respond(HttpResponse {
            status: 200,
            url: String::new(),
            headers: vec![("content-type".into(), "application/json".into())],
            body: value.to_string(),
        })
    }

    /// Arbitrary status with a text body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond(HttpResponse {
            status,
            url: String::new(),
            headers: Vec::new(),
            body: body.into(),
        })
    }

    /// `200` whose final URL differs from the requested one, as after a redirect.
    pub fn redirected(final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Respond(HttpResponse {
            status: 200,
            url: final_url.into(),
            headers: Vec::new(),
            body: body.into(),
        })
    }

    /// Connection-level failure.
    pub fn network(kind: NetworkErrorKind) -> Self {
        Self::Fail(YfError::network(kind, format!("mock {}", kind.code())))
    }

    /// Add a response header (no effect on non-`Respond` replies).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Self::Respond(resp) = &mut self {
            resp.headers.push((name.to_ascii_lowercase(), value.to_string()));
        }
        self
    }

    /// Delay this reply.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delay(delay, Box::new(self))
    }
}

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The request itself.
    pub request: HttpRequest,
    /// Connector it was routed through.
    pub via: OutboundConnector,
    /// `Cookie` header the transport would have sent, if any cookies were stored.
    pub cookie_header: Option<String>,
}

impl RecordedRequest {
    /// Path component of the request URL.
    #[must_use]
    pub fn path(&self) -> &str {
        path_of(&self.request.url)
    }
}

#[derive(Default)]
struct PathRules {
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
}

#[derive(Default)]
struct InternalState {
    rules: HashMap<String, PathRules>,
    requests: Vec<RecordedRequest>,
    cookies: Vec<(String, String)>,
    injected: Vec<CookieRecord>,
}

fn path_of(url: &str) -> &str {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme.find('/').map_or("/", |i| &after_scheme[i..]);
    path.split(['?', '#']).next().unwrap_or("/")
}

/// Controller handle used by tests to script the transport from the outside.
#[derive(Clone)]
pub struct ScriptedController {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedController {
    fn with_state<R>(&self, f: impl FnOnce(&mut InternalState) -> R) -> R {
        let mut guard = self.state.lock().expect("mutex poisoned");
        f(&mut guard)
    }

    /// Queue a one-shot reply for `path`. Queued replies are consumed in order
    /// before the fallback applies.
    pub fn push(&self, path: &str, reply: Reply) {
        self.with_state(|s| s.rules.entry(path.to_string()).or_default().queued.push_back(reply));
    }

    /// Reply used for `path` whenever its queue is empty.
    pub fn set_fallback(&self, path: &str, reply: Reply) {
        self.with_state(|s| s.rules.entry(path.to_string()).or_default().fallback = Some(reply));
    }

    /// Every request seen so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.with_state(|s| s.requests.clone())
    }

    /// Requests whose URL path equals `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.with_state(|s| {
            s.requests
                .iter()
                .filter(|r| r.path() == path)
                .cloned()
                .collect()
        })
    }

    /// Number of requests whose URL path equals `path`.
    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    /// Cookies handed to [`Transport::inject_cookies`].
    #[must_use]
    pub fn injected_cookies(&self) -> Vec<CookieRecord> {
        self.with_state(|s| s.injected.clone())
    }

    /// Clear all scripted replies, logs and cookies.
    pub fn reset(&self) {
        self.with_state(|s| *s = InternalState::default());
    }
}

/// A [`Transport`] that answers from per-path scripts instead of the network.
///
/// Paths without a script answer `404`. `Set-Cookie` headers on scripted
/// responses are stored (name and value only) and replayed in the recorded
/// `cookie_header` of later requests.
pub struct ScriptedTransport {
    state: Arc<Mutex<InternalState>>,
}

impl ScriptedTransport {
    /// Create a transport and its controller.
    #[must_use]
    pub fn new_with_controller() -> (Arc<Self>, ScriptedController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = ScriptedController {
            state: Arc::clone(&state),
        };
        (Arc::new(Self { state }), controller)
    }

    fn store_cookie(state: &mut InternalState, name: &str, value: &str) {
        match state.cookies.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => state.cookies.push((name.to_string(), value.to_string())),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, req: HttpRequest, via: &OutboundConnector) -> Result<HttpResponse, YfError> {
        // Record and pick the reply without holding the lock across await points
        let reply = {
            let mut guard = self.state.lock().expect("mutex poisoned");
            let cookie_header = (!guard.cookies.is_empty()).then(|| {
                guard
                    .cookies
                    .iter()
                    .map(|(n, v)| format!("{n}={v}"))
                    .collect::<Vec<_>>()
                    .join("; ")
            });
            let path = path_of(&req.url).to_string();
            let url = req.url.clone();
            guard.requests.push(RecordedRequest {
                request: req,
                via: via.clone(),
                cookie_header,
            });
            let reply = guard.rules.get_mut(&path).and_then(|r| {
                r.queued.pop_front().or_else(|| r.fallback.clone())
            });
            (url, reply)
        };

        let (url, mut reply) = reply;
        loop {
            match reply {
                None => {
                    return Ok(HttpResponse {
                        status: 404,
                        url,
                        headers: Vec::new(),
                        body: "Not Found".into(),
                    });
                }
                Some(Reply::Respond(mut resp)) => {
                    if resp.url.is_empty() {
                        resp.url = url;
                    }
                    let mut guard = self.state.lock().expect("mutex poisoned");
                    for (_, v) in resp.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie")) {
                        let pair = v.split(';').next().unwrap_or_default();
                        if let Some((n, val)) = pair.split_once('=') {
                            Self::store_cookie(&mut guard, n.trim(), val.trim());
                        }
                    }
                    return Ok(resp);
                }
                Some(Reply::Fail(e)) => return Err(e),
                Some(Reply::Delay(d, inner)) => {
                    tokio::time::sleep(d).await;
                    reply = Some(*inner);
                }
                Some(Reply::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn inject_cookies(&self, cookies: &[CookieRecord]) -> Result<(), YfError> {
        let mut guard = self.state.lock().expect("mutex poisoned");
        for c in cookies {
            if c.name.is_empty() {
                return Err(YfError::invalid_arg("cookie name must not be empty"));
            }
            Self::store_cookie(&mut guard, &c.name, &c.value);
            guard.injected.push(c.clone());
        }
        Ok(())
    }
}
