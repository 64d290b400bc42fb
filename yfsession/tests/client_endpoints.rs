mod helpers;

use helpers::scripted_session;
use serde_json::json;
use yfsession::{YfClient, YfError};
use yfsession_mock::Reply;

#[tokio::test(start_paused = true)]
async fn quotes_fan_out_and_keep_every_item() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback(
        "/v7/finance/quote",
        Reply::json(&json!({"quoteResponse": {"result": [
            {"symbol": "X", "regularMarketTime": 1_700_000_000, "regularMarketPrice": 1.5}
        ], "error": null}})),
    );
    let client = YfClient::new(session);

    let symbols: Vec<String> = (0..120).map(|i| format!("S{i}")).collect();
    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let quotes = client.quotes(&refs).await.unwrap();

    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0]["regularMarketTime"], json!("2023-11-14T22:13:20Z"));

    let reqs = ctl.requests_to("/v7/finance/quote");
    assert_eq!(reqs.len(), 3);
    let mut sent: Vec<String> = Vec::new();
    for r in &reqs {
        assert_eq!(r.request.query_param("crumb"), Some("abc"));
        assert_eq!(r.request.query_param("lang"), Some("en-US"));
        assert_eq!(r.request.query_param("region"), Some("US"));
        let chunk: Vec<String> = r
            .request
            .query_param("symbols")
            .unwrap()
            .split(',')
            .map(str::to_string)
            .collect();
        assert!(chunk.len() <= 50);
        sent.extend(chunk);
    }
    sent.sort();
    let mut expected = symbols.clone();
    expected.sort();
    assert_eq!(sent, expected);
}

#[tokio::test(start_paused = true)]
async fn empty_symbol_list_is_invalid() {
    let (session, ctl) = scripted_session("abc");
    let client = YfClient::new(session);

    let err = client.quotes(&[]).await.unwrap_err();
    assert!(matches!(err, YfError::InvalidArg(_)));
    assert!(ctl.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn chart_yields_candles_without_crumb() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback(
        "/v8/finance/chart/AAPL",
        Reply::json(&json!({"chart": {"result": [{
            "timestamp": [1_700_000_000, 1_700_086_400],
            "indicators": {"quote": [{"open": [1.0, 2.0], "high": [1.5, 2.5], "low": [0.5, 1.5],
                                      "close": [1.2, 2.2], "volume": [10, 20]}]}
        }], "error": null}})),
    );
    let client = YfClient::new(session);

    let bars = client.chart("AAPL", "5d", "1d").await.unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].close, 2.2);
    assert_eq!(bars[1].volume, Some(20));
    let req = &ctl.requests_to("/v8/finance/chart/AAPL")[0].request;
    assert_eq!(req.query_param("range"), Some("5d"));
    assert_eq!(req.query_param("crumb"), None);
}

#[tokio::test(start_paused = true)]
async fn quote_summary_flattens_modules() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback(
        "/v10/finance/quoteSummary/MSFT",
        Reply::json(&json!({"quoteSummary": {"result": [{
            "price": {"regularMarketPrice": {"raw": 370.1, "fmt": "370.10"}, "currency": "USD"},
            "summaryDetail": {"beta": {}}
        }], "error": null}})),
    );
    let client = YfClient::new(session);

    let modules = client.quote_summary("MSFT", &["price", "summaryDetail"]).await.unwrap();

    assert_eq!(modules["price"]["regularMarketPrice"], json!(370.1));
    assert_eq!(modules["summaryDetail"]["beta"], serde_json::Value::Null);
    let req = &ctl.requests_to("/v10/finance/quoteSummary/MSFT")[0].request;
    assert_eq!(req.query_param("modules"), Some("price,summaryDetail"));
    assert_eq!(req.query_param("crumb"), Some("abc"));
}

#[tokio::test(start_paused = true)]
async fn error_envelope_in_success_body_is_api_error() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback(
        "/v10/finance/quoteSummary/NOPE",
        Reply::json(&json!({"quoteSummary": {"result": null, "error": {
            "code": "Not Found", "description": "Quote not found for symbol: NOPE"
        }}})),
    );
    let client = YfClient::new(session);

    let err = client.quote_summary("NOPE", &["price"]).await.unwrap_err();
    assert_eq!(err, YfError::api("Not Found", "Quote not found for symbol: NOPE"));
    assert_eq!(ctl.count("/v10/finance/quoteSummary/NOPE"), 1);
}

#[tokio::test(start_paused = true)]
async fn search_and_options_reach_their_endpoints() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback(
        "/v1/finance/search",
        Reply::json(&json!({"quotes": [{"symbol": "AAPL", "score": {"raw": 2.0, "fmt": "2"}}]})),
    );
    ctl.set_fallback(
        "/v7/finance/options/AAPL",
        Reply::json(&json!({"optionChain": {"result": [{
            "underlyingSymbol": "AAPL", "expirationDates": [1_700_000_000]
        }], "error": null}})),
    );
    let client = YfClient::new(session);

    let found = client.search("apple").await.unwrap();
    assert_eq!(found["quotes"][0]["score"], json!(2.0));
    let search_req = &ctl.requests_to("/v1/finance/search")[0].request;
    assert_eq!(search_req.query_param("q"), Some("apple"));
    assert_eq!(search_req.query_param("crumb"), None);

    let chain = client.options("AAPL", Some(1_700_000_000)).await.unwrap();
    assert_eq!(chain["underlyingSymbol"], json!("AAPL"));
    let opt_req = &ctl.requests_to("/v7/finance/options/AAPL")[0].request;
    assert_eq!(opt_req.query_param("date"), Some("1700000000"));
    assert_eq!(opt_req.query_param("crumb"), Some("abc"));
}
