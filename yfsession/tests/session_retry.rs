mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use helpers::{
    CRUMB, ORIGIN, chrome, fast_retry, invalid_crumb_reply, scripted_builder, scripted_session, url,
};
use tokio::time::Instant;
use yfsession::{ApiHosts, NetworkErrorKind, RequestOptions, RetryConfig, Session, YfError};
use yfsession_mock::{Reply, ScriptedTransport};

#[tokio::test(start_paused = true)]
async fn rate_limit_waits_for_retry_after() {
    let (session, ctl) = scripted_session("abc");
    ctl.push("/data", Reply::status(429, "Too Many Requests").with_header("Retry-After", "2"));
    ctl.set_fallback("/data", Reply::ok("done"));
    session.initialize().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let start = Instant::now();
    let resp = session
        .get(
            &url("/data"),
            RequestOptions::new().on_retry(move |e, n, d| {
                sink.lock().unwrap().push((e.http_status(), n, d));
            }),
        )
        .await
        .unwrap();

    assert_eq!(resp.body, "done");
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(*seen.lock().unwrap(), vec![(Some(429), 1, Duration::from_secs(2))]);
    assert_eq!(ctl.count("/data"), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_back_off_exponentially() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/data", Reply::status(503, "unavailable"));
    session.initialize().await;

    let start = Instant::now();
    let err = session.get(&url("/data"), RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.http_status(), Some(503));
    assert_eq!(ctl.count("/data"), 4);
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(10 + 20 + 40), "{waited:?}");
    assert!(waited < Duration::from_millis(80), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn network_error_then_success() {
    let (session, ctl) = scripted_session("abc");
    ctl.push("/data", Reply::network(NetworkErrorKind::ConnectionReset));
    ctl.set_fallback("/data", Reply::ok("ok"));

    let resp = session.get(&url("/data"), RequestOptions::new()).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(ctl.count("/data"), 2);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_not_retried() {
    let (session, ctl) = scripted_session("abc");
    session.initialize().await;

    let start = Instant::now();
    let err = session.get(&url("/nowhere"), RequestOptions::new()).await.unwrap_err();

    assert!(matches!(err, YfError::Http { status: 404, .. }));
    assert_eq!(ctl.count("/nowhere"), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn disabled_retry_attempts_once() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/data", Reply::status(503, "unavailable"));

    let err = session
        .get(&url("/data"), RequestOptions::new().retry(RetryConfig::disabled()))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(503));
    assert_eq!(ctl.count("/data"), 1);
}

#[tokio::test(start_paused = true)]
async fn per_call_policy_replaces_session_policy() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/data", Reply::status(500, "boom"));

    let _ = session
        .get(&url("/data"), RequestOptions::new().retry(fast_retry(1)))
        .await;
    assert_eq!(ctl.count("/data"), 2);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_per_call_policy_is_rejected() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/data", Reply::ok("{}"));

    let mut shrinking = fast_retry(2);
    shrinking.factor = 0.5;
    let mut nan = fast_retry(2);
    nan.factor = f64::NAN;
    let mut wild = fast_retry(2);
    wild.jitter_factor = 3.0;

    for cfg in [shrinking, nan, wild] {
        let err = session
            .get(&url("/data"), RequestOptions::new().retry(cfg))
            .await
            .unwrap_err();
        assert!(matches!(err, YfError::InvalidArg(_)), "{err:?}");
    }
    assert!(ctl.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn invalid_crumb_refreshes_before_retrying() {
    let (builder, ctl) = scripted_builder();
    ctl.push(CRUMB, Reply::ok("stale"));
    ctl.set_fallback(CRUMB, Reply::ok("fresh"));
    ctl.push("/data", invalid_crumb_reply());
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder.build().unwrap();

    session.get(&url("/data"), RequestOptions::new()).await.unwrap();

    let crumbs: Vec<Option<String>> = ctl
        .requests_to("/data")
        .iter()
        .map(|r| r.request.query_param("crumb").map(str::to_string))
        .collect();
    assert_eq!(crumbs, vec![Some("stale".into()), Some("fresh".into())]);
    assert_eq!(ctl.count(CRUMB), 2);
    assert_eq!(session.token().as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn plain_text_unauthorized_refreshes_before_retrying() {
    let (builder, ctl) = scripted_builder();
    ctl.push(CRUMB, Reply::ok("stale"));
    ctl.set_fallback(CRUMB, Reply::ok("fresh"));
    ctl.push("/data", Reply::status(401, "Unauthorized"));
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder.build().unwrap();

    session.get(&url("/data"), RequestOptions::new()).await.unwrap();

    assert_eq!(ctl.count("/data"), 2);
    assert_eq!(ctl.count(CRUMB), 2);
    let retried = &ctl.requests_to("/data")[1];
    assert_eq!(retried.request.query_param("crumb"), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_invalid_crumbs_share_one_refresh() {
    let (builder, ctl) = scripted_builder();
    ctl.push(CRUMB, Reply::ok("stale"));
    ctl.set_fallback(CRUMB, Reply::ok("fresh").after(Duration::from_millis(100)));
    ctl.push("/data", invalid_crumb_reply());
    ctl.push("/data", invalid_crumb_reply());
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder.build().unwrap();

    let target = url("/data");
    let (a, b) = tokio::join!(
        session.get(&target, RequestOptions::new()),
        session.get(&target, RequestOptions::new()),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(ctl.count(CRUMB), 2, "bootstrap plus exactly one refresh");
    let retried: Vec<_> = ctl.requests_to("/data").into_iter().skip(2).collect();
    assert_eq!(retried.len(), 2);
    for r in retried {
        assert_eq!(r.request.query_param("crumb"), Some("fresh"));
    }
    assert_eq!(session.token().as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn refresh_token_callers_observe_the_same_result() {
    let (builder, ctl) = scripted_builder();
    ctl.push(CRUMB, Reply::ok("first"));
    ctl.set_fallback(CRUMB, Reply::ok("second").after(Duration::from_millis(20)));
    let session = builder.build().unwrap();
    session.initialize().await;

    let (a, b, c) = tokio::join!(
        session.refresh_token(),
        session.refresh_token(),
        session.refresh_token(),
    );
    assert_eq!(a.as_deref(), Some("second"));
    assert_eq!(b, a);
    assert_eq!(c, a);
    assert_eq!(ctl.count(CRUMB), 2);

    // A later refresh is a new fetch.
    session.refresh_token().await;
    assert_eq!(ctl.count(CRUMB), 3);
}

#[tokio::test(start_paused = true)]
async fn unrecoverable_token_exhausts_retries() {
    let (builder, ctl) = scripted_builder();
    ctl.push(CRUMB, Reply::ok("stale"));
    ctl.set_fallback(CRUMB, Reply::ok("<html>blocked</html>"));
    ctl.set_fallback("/data", invalid_crumb_reply());
    let session = builder.retry(fast_retry(2)).build().unwrap();

    let err = session.get(&url("/data"), RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.http_status(), Some(401));
    assert_eq!(ctl.count("/data"), 3);
    assert_eq!(ctl.count(CRUMB), 3);
    assert_eq!(session.token(), None);
}

#[tokio::test(start_paused = true)]
async fn without_token_omits_the_crumb() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/v1/finance/search", Reply::ok("{}"));

    session
        .get(
            &url("/v1/finance/search"),
            RequestOptions::new().without_token().query("q", "apple").header("x-trace", "1"),
        )
        .await
        .unwrap();

    let req = &ctl.requests_to("/v1/finance/search")[0].request;
    assert_eq!(req.query_param("crumb"), None);
    assert_eq!(req.query_param("q"), Some("apple"));
    assert!(req.headers.contains(&("x-trace".to_string(), "1".to_string())));
}

#[tokio::test(start_paused = true)]
async fn json_helpers_decode_bodies() {
    let (session, ctl) = scripted_session("abc");
    ctl.set_fallback("/data", Reply::json(&serde_json::json!({"answer": 42})));
    ctl.push("/broken", Reply::ok("not json"));

    let v: serde_json::Value = session.get_json(&url("/data"), RequestOptions::new()).await.unwrap();
    assert_eq!(v["answer"], 42);

    let err = session
        .get_json::<serde_json::Value>(&url("/broken"), RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, YfError::Parse(_)));
}

#[tokio::test(start_paused = true)]
async fn abandoned_refresh_does_not_outlive_the_session() {
    let (transport, ctl) = ScriptedTransport::new_with_controller();
    ctl.set_fallback("/", Reply::ok("<html>home</html>"));
    ctl.push(CRUMB, Reply::ok("first"));
    ctl.set_fallback(CRUMB, Reply::ok("late").after(Duration::from_secs(10)));
    let session = Session::builder()
        .hosts(ApiHosts::single_origin(ORIGIN))
        .retry(fast_retry(3))
        .identity(chrome())
        .transport(Arc::clone(&transport) as Arc<dyn yfsession::Transport>)
        .build()
        .unwrap();
    session.initialize().await;
    assert_eq!(Arc::strong_count(&transport), 2);

    let abandoned = tokio::time::timeout(Duration::from_millis(5), session.refresh_token()).await;
    assert!(abandoned.is_err());

    drop(session);
    assert_eq!(Arc::strong_count(&transport), 1);
}
