use thiserror::Error;

use crate::types::RunStatus;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Request to Apify failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Apify returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected Apify response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Actor run {run_id} ended {status}")]
    RunEnded { run_id: String, status: RunStatus },
}
