use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unification formed a cycle involving {0}")]
    Cycle(String),
    #[error("invalid goal expression")]
    InvalidGoal,
}
