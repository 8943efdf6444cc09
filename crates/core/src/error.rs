use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("observer invariant violated: {0}")]
    Invariant(String),
    #[error("sink error: {0}")]
    Sink(#[from] xrefscope_api::SinkError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
