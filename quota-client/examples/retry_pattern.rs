use quota_client::QuotaClient;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Quota Retry Pattern Example\n");

    let client = QuotaClient::connect("http://localhost:8080")?;
    let identifier = "retry_user";
    let resource = "api.search";

    let result = make_request_with_retry(&client, identifier, resource, 1, 3).await;

    match result {
        Ok(_) => println!("Request succeeded"),
        Err(e) => println!("Request failed after retries: {}", e),
    }

    Ok(())
}

async fn make_request_with_retry(
    client: &QuotaClient,
    identifier: &str,
    resource: &str,
    cost: u64,
    max_retries: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    for attempt in 0..=max_retries {
        println!("Attempt {}/{}", attempt + 1, max_retries + 1);

        let result = client.check_detailed(identifier, resource, cost, None).await?;

        if result.allowed {
            println!("Request allowed on attempt {}", attempt + 1);
            return Ok(());
        } else if attempt < max_retries {
            let wait_secs = result.retry_after.unwrap_or(1).max(1);
            println!("Rate limited. Waiting {wait_secs} seconds before retry...");
            sleep(Duration::from_secs(wait_secs)).await;
        } else {
            println!("Rate limited. Max retries exceeded.");
            return Err("rate limited after max retries".into());
        }
    }

    Err("failed after retries".into())
}
