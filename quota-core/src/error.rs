use thiserror::Error;

/// Error kinds surfaced by the decision engine (spec §7).
///
/// Algorithms never swallow or retry a store error — they propagate it
/// verbatim so the caller can apply the "no fallback allow" policy.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store returned an unexpected value shape: {0}")]
    StoreInconsistent(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// `StoreInconsistent` is treated as transient, same as `StoreUnavailable`
    /// (spec §7) — this is the predicate the HTTP layer uses to pick a status.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::StoreInconsistent(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
