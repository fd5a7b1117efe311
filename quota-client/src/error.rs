use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("rate limited - request denied")]
    RateLimited,

    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
