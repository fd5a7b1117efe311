//! Quota Client Library
//!
//! A Rust client for the Quota rate limiter HTTP service.
//!
//! # Examples
//!
//! ```no_run
//! use quota_client::QuotaClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = QuotaClient::connect("http://localhost:8080")?;
//!
//!     let allowed = client.check("user123", "api.search", 1).await?;
//!     if allowed {
//!         println!("Request allowed!");
//!     } else {
//!         println!("Request denied - rate limited");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{LimitCheckResult, QuotaClient};
pub use error::{ClientError, Result};
