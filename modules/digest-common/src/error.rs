use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
