#[cfg(test)]
mod tests {
    use quota_client::QuotaClient;

    #[tokio::test]
    #[ignore]
    async fn test_basic_connection() {
        let client = QuotaClient::connect("http://localhost:8080");
        assert!(client.is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_check() {
        let client = QuotaClient::connect("http://localhost:8080").unwrap();
        let result = client.check("test_user", "api.search", 1).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn test_status_after_check() {
        let client = QuotaClient::connect("http://localhost:8080").unwrap();
        client.check("usage_test", "api.search", 10).await.unwrap();
        let status = client.status("usage_test:api.search", None).await.unwrap();
        assert!(status.remaining <= status.limit);
    }

    #[tokio::test]
    #[ignore]
    async fn test_reset() {
        let client = QuotaClient::connect("http://localhost:8080").unwrap();
        client.check("reset_test", "api.search", 1).await.unwrap();
        client.reset("reset_test:api.search", None).await.unwrap();
    }
}
