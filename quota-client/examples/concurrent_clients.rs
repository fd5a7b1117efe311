use quota_client::QuotaClient;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Quota Concurrent Clients Example\n");

    let client = Arc::new(QuotaClient::connect("http://localhost:8080")?);
    let resource = "api.search";

    let mut handles = vec![];

    for user_id in 0..10 {
        let client = Arc::clone(&client);
        let resource = resource.to_string();

        let handle = tokio::spawn(async move {
            let identifier = format!("user_{}", user_id);
            let mut allowed = 0;
            let mut denied = 0;

            for _ in 0..20 {
                match client.check(&identifier, &resource, 1).await {
                    Ok(true) => allowed += 1,
                    Ok(false) => denied += 1,
                    Err(e) => eprintln!("Error for {}: {}", identifier, e),
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }

            (identifier, allowed, denied)
        });

        handles.push(handle);
    }

    println!("Running concurrent requests...\n");
    for handle in handles {
        let (identifier, allowed, denied) = handle.await?;
        println!("{}: {} allowed, {} denied", identifier, allowed, denied);
    }

    println!("\nAll concurrent requests completed!");
    Ok(())
}
