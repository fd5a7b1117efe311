use quota_client::QuotaClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Quota Client Example\n");

    println!("Connecting to Quota service at localhost:8080...");
    let client = QuotaClient::connect("http://localhost:8080")?;
    println!("Connected!\n");

    println!("=== Example 1: Simple Check ===");
    let identifier = "user123";
    let resource = "api.search";

    for i in 1..=5 {
        match client.check(identifier, resource, 1).await {
            Ok(true) => println!("Request {} allowed", i),
            Ok(false) => println!("Request {} denied - rate limited", i),
            Err(e) => println!("Error: {}", e),
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    println!();

    println!("=== Example 2: Status ===");
    match client.status(&format!("{identifier}:{resource}"), None).await {
        Ok(status) => println!("Remaining for {}: {}/{}", identifier, status.remaining, status.limit),
        Err(e) => println!("Error: {}", e),
    }

    println!();

    println!("=== Example 3: Detailed Check ===");
    match client.check_detailed(identifier, resource, 10, None).await {
        Ok(result) => {
            if result.allowed {
                println!("Request allowed");
                println!("   Remaining: {}", result.remaining);
            } else {
                println!("Request denied");
                println!("   Retry after: {:?} seconds", result.retry_after);
            }
        }
        Err(e) => println!("Error: {}", e),
    }

    println!();

    println!("=== Example 4: With Rate Limit ===");
    let result = client
        .with_rate_limit("user456", resource, 1, async {
            println!("Executing protected operation...");
            Ok::<_, quota_client::ClientError>("Operation successful!")
        })
        .await;

    match result {
        Ok(msg) => println!("{}", msg),
        Err(e) => println!("{}", e),
    }

    println!();

    println!("=== Example 5: Reset ===");
    match client.reset(&format!("{identifier}:{resource}"), None).await {
        Ok(_) => println!("Limit reset successfully for {}", identifier),
        Err(e) => println!("Error: {}", e),
    }

    println!("\nExamples complete!");
    Ok(())
}
