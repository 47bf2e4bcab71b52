use std::time::Duration;

use rerequests::{RequestOptions, RetryPolicy, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("REREQUESTS_DEMO_URL")
        .unwrap_or_else(|_| "https://httpbin.org/status/200,503".to_owned());

    match rerequests::get(&url, RequestOptions::new()).await {
        Ok(response) => println!("no retries: {}", response.status()),
        Err(err) => println!("no retries: {err}"),
    }

    let policy = RetryPolicy::builder().total(5).backoff_factor(0.25).build()?;
    let response = rerequests::get(
        &url,
        RequestOptions::new()
            .max_retries(policy)
            .timeout((Duration::from_millis(3_050), Duration::from_secs(27))),
    )
    .await?;
    println!("with retries: {}", response.status());

    let session = Session::new();
    let response = session
        .get(&url, RequestOptions::new().raise_for_status())
        .await?;
    println!("session: {} ({} bytes)", response.status(), response.bytes().len());

    Ok(())
}
