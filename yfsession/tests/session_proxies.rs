mod helpers;

use std::time::Duration;

use helpers::{CRUMB, scripted_builder, url};
use yfsession::{
    NetworkErrorKind, OutboundConnector, ProxyDescriptor, ProxyPoolConfig, RequestOptions,
};
use yfsession_mock::Reply;

fn proxy(uri: &str) -> ProxyDescriptor {
    ProxyDescriptor::parse(uri).expect("valid proxy uri")
}

fn pool(uris: &[&str], max_failures: u32) -> ProxyPoolConfig {
    ProxyPoolConfig {
        proxies: uris.iter().map(|u| proxy(u)).collect(),
        max_failures,
        cooldown: Duration::from_secs(60),
    }
}

#[tokio::test(start_paused = true)]
async fn every_attempt_takes_the_next_proxy() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder
        .proxies(pool(&["http://10.0.0.1:8080", "socks5://10.0.0.2:1080"], 3))
        .build()
        .unwrap();

    session.get(&url("/data"), RequestOptions::new()).await.unwrap();
    session.get(&url("/data"), RequestOptions::new()).await.unwrap();

    let via: Vec<OutboundConnector> = ctl.requests().into_iter().map(|r| r.via).collect();
    let a = OutboundConnector::HttpProxy(proxy("http://10.0.0.1:8080"));
    let b = OutboundConnector::Socks5(proxy("socks5://10.0.0.2:1080"));
    // landing, crumb, then the two data calls
    assert_eq!(via, vec![a.clone(), b.clone(), a, b]);
}

#[tokio::test(start_paused = true)]
async fn proxy_failure_rotates_to_the_next_proxy() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    ctl.push("/data", Reply::network(NetworkErrorKind::ConnectionRefused));
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder
        .proxies(pool(&["http://10.0.0.1:8080", "http://10.0.0.2:8080"], 1))
        .build()
        .unwrap();

    session.get(&url("/data"), RequestOptions::new()).await.unwrap();

    let data_via: Vec<OutboundConnector> = ctl.requests_to("/data").into_iter().map(|r| r.via).collect();
    assert_eq!(
        data_via,
        vec![
            OutboundConnector::for_proxy(Some(&proxy("http://10.0.0.1:8080"))),
            OutboundConnector::for_proxy(Some(&proxy("http://10.0.0.2:8080"))),
        ]
    );

    let stats = session.proxy_stats().unwrap();
    assert_eq!(stats[0].consecutive_failures, 1);
    assert!(!stats[0].is_healthy);
    assert_eq!(stats[0].success_count, 1);
    assert!(stats[1].is_healthy);
    assert_eq!(stats[1].success_count, 2);
}

#[tokio::test(start_paused = true)]
async fn origin_errors_do_not_count_against_the_proxy() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    let session = builder
        .proxies(pool(&["http://10.0.0.1:8080"], 1))
        .build()
        .unwrap();

    let err = session.get(&url("/missing"), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.http_status(), Some(404));

    let stats = session.proxy_stats().unwrap();
    assert_eq!(stats[0].consecutive_failures, 0);
    assert!(stats[0].is_healthy);
}

#[tokio::test(start_paused = true)]
async fn proxy_auth_required_counts_as_proxy_failure() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    ctl.set_fallback("/data", Reply::status(407, "Proxy Authentication Required"));
    let session = builder
        .proxies(pool(&["http://10.0.0.1:8080"], 3))
        .build()
        .unwrap();

    let err = session.get(&url("/data"), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.http_status(), Some(407));
    assert_eq!(ctl.count("/data"), 1);
    assert_eq!(session.proxy_stats().unwrap()[0].consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn all_unhealthy_pool_keeps_serving() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    ctl.push("/data", Reply::network(NetworkErrorKind::TimedOut));
    ctl.push("/data", Reply::network(NetworkErrorKind::TimedOut));
    ctl.set_fallback("/data", Reply::ok("{}"));
    let session = builder
        .proxies(pool(&["http://10.0.0.1:8080", "http://10.0.0.2:8080"], 1))
        .build()
        .unwrap();

    session.get(&url("/data"), RequestOptions::new()).await.unwrap();

    let data = ctl.requests_to("/data");
    assert_eq!(data.len(), 3);
    assert_eq!(data[2].via, OutboundConnector::for_proxy(Some(&proxy("http://10.0.0.1:8080"))));
    assert!(session.proxy_stats().unwrap().iter().all(|s| s.is_healthy));
}

#[tokio::test(start_paused = true)]
async fn no_pool_means_direct() {
    let (builder, ctl) = scripted_builder();
    ctl.set_fallback(CRUMB, Reply::ok("abc"));
    let session = builder.build().unwrap();

    session.initialize().await;

    assert!(session.proxy_stats().is_none());
    assert!(ctl.requests().iter().all(|r| r.via == OutboundConnector::Direct));
}
