#![allow(dead_code)]

use std::time::Duration;

use yfsession::{ApiHosts, BrowserIdentity, RetryConfig, Session, SessionBuilder};
use yfsession_mock::{Reply, ScriptedController, ScriptedTransport};

pub const ORIGIN: &str = "https://mock.invalid";
pub const CRUMB: &str = "/v1/test/getcrumb";
pub const CONSENT_SUBMIT: &str = "/v2/collectConsent";

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

/// Deterministic retry policy: 10 ms, 20 ms, 40 ms ...
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_retries,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(5),
        factor: 2.0,
        jitter: false,
        jitter_factor: 0.0,
    }
}

/// Builder wired to a scripted transport whose landing page sets a cookie.
/// The crumb endpoint is left unscripted.
pub fn scripted_builder() -> (SessionBuilder, ScriptedController) {
    let (transport, ctl) = ScriptedTransport::new_with_controller();
    ctl.set_fallback("/", Reply::ok("<html>home</html>").with_header("set-cookie", "A3=d=AQAB; Path=/"));
    let builder = Session::builder()
        .hosts(ApiHosts::single_origin(ORIGIN))
        .retry(fast_retry(3))
        .identity(chrome())
        .transport(transport);
    (builder, ctl)
}

/// Ready-to-use session whose crumb endpoint always answers `crumb`.
pub fn scripted_session(crumb: &str) -> (Session, ScriptedController) {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok(crumb.to_string()));
    (builder.build().expect("valid session"), ctl)
}

pub fn invalid_crumb_reply() -> Reply {
    Reply::status(
        401,
        r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#,
    )
}

pub fn chrome() -> &'static BrowserIdentity {
    BrowserIdentity::by_name("chrome-windows").expect("catalog entry")
}
