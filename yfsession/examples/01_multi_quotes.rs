mod common;
use yfsession::YfClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Build the session (nothing is fetched yet).
    let client = YfClient::new(common::get_session()?);

    // 2. The first call bootstraps cookies and the crumb, then fans out.
    let quotes = client.quotes(&["AAPL", "MSFT"]).await?;
    for q in &quotes {
        let symbol = q["symbol"].as_str().unwrap_or("?");
        let price = q["regularMarketPrice"].as_f64().map_or_else(|| "<no price>".to_string(), |p| format!("{p:.2}"));
        let time = q["regularMarketTime"].as_str().unwrap_or("-");
        println!("{symbol}: {price} at {time}");
    }

    // 3. Session state is observable afterwards.
    let session = client.session();
    println!(
        "state={:?} identity={} crumb={}",
        session.state(),
        session.identity().name,
        session.token().is_some()
    );

    Ok(())
}
