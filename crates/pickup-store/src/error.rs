use pickup_core::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed boolean expression: {0}")]
    Expression(String),
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Expression(msg) => BackendError::Query(msg),
            StoreError::Json(e) => BackendError::Decode(e.to_string()),
            other @ (StoreError::NotFound(_) | StoreError::Io(_)) => {
                BackendError::Transport(other.to_string())
            }
        }
    }
}
