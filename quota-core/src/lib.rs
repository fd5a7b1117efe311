//! Quota — the rate-limiting decision engine.
//!
//! Four layers, leaves-first: [`clock::Clock`], [`store::Store`], the
//! three [`algorithms`], and the [`dispatcher::Dispatcher`] that routes
//! requests among them. The HTTP framing, configuration file loading, and
//! everything else that touches the network lives one crate up, in
//! `quota-service` — this crate only knows opaque keys, durations, and
//! instants.

pub mod algorithms;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod store;

pub use algorithms::{FixedWindowAlgorithm, LimitInfo, RateLimitAlgorithm, SlidingWindowAlgorithm, TokenBucketAlgorithm};
pub use clock::{Clock, SystemClock, TestClock};
pub use config::LimitConfig;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use store::{ConditionalIncrement, LocalStore, Store, TokenOutcome};
