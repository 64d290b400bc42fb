mod common;
use std::time::Duration;

use yfsession::{RequestOptions, RetryConfig, YfClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let session = common::get_session()?;

    // A raw request with a tighter, logged retry policy.
    let opts = RequestOptions::new()
        .retry(RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(250),
            ..RetryConfig::default()
        })
        .on_retry(|err, n, delay| eprintln!("retry #{n} in {delay:?} after: {err}"));
    let url = format!("{}/v8/finance/chart/AAPL", session.config().hosts.query2);
    let resp = session.get(&url, opts.without_token()).await?;
    println!("raw chart response: {} bytes", resp.body.len());

    // The same data through the typed client.
    let client = YfClient::new(session);
    for bar in client.chart("AAPL", "5d", "1d").await? {
        println!("{} close={:.2} volume={:?}", bar.ts.format("%Y-%m-%d"), bar.close, bar.volume);
    }

    if let Some(stats) = client.session().proxy_stats() {
        for s in stats {
            println!(
                "proxy {} healthy={} ok={} failing={}",
                s.descriptor.display_endpoint(),
                s.is_healthy,
                s.success_count,
                s.consecutive_failures
            );
        }
    }
    Ok(())
}
