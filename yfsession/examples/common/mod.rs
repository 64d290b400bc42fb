use serde_json::json;
use yfsession::{ApiHosts, Session, SessionConfig, YfError};
use yfsession_mock::{Reply, ScriptedTransport};

/// Live session from `YF_*` environment variables, or a canned offline one
/// when `YFSESSION_EXAMPLES_USE_MOCK` is set (used in CI).
pub fn get_session() -> Result<Session, YfError> {
    if std::env::var("YFSESSION_EXAMPLES_USE_MOCK").is_err() {
        return Session::new(SessionConfig::from_env()?);
    }

    println!("--- (Using scripted transport for CI) ---");
    let (transport, controller) = ScriptedTransport::new_with_controller();
    controller.set_fallback("/", Reply::ok("<html></html>").with_header("set-cookie", "A3=mock; Path=/"));
    controller.set_fallback("/v1/test/getcrumb", Reply::ok("mockcrumb"));
    controller.set_fallback(
        "/v7/finance/quote",
        Reply::json(&json!({"quoteResponse": {"result": [
            {"symbol": "AAPL", "regularMarketPrice": 187.25, "regularMarketTime": 1_700_000_000},
            {"symbol": "MSFT", "regularMarketPrice": 370.1, "regularMarketTime": 1_700_000_000}
        ], "error": null}})),
    );
    controller.set_fallback(
        "/v8/finance/chart/AAPL",
        Reply::json(&json!({"chart": {"result": [{
            "timestamp": [1_700_000_000, 1_700_086_400],
            "indicators": {"quote": [{"open": [186.0, 187.0], "high": [188.0, 189.0], "low": [185.0, 186.5],
                                      "close": [187.25, 188.4], "volume": [51_000_000, 48_000_000]}]}
        }], "error": null}})),
    );

    Session::builder()
        .hosts(ApiHosts::single_origin("https://mock.invalid"))
        .transport(transport)
        .build()
}
