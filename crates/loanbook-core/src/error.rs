use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanbookError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LoanbookError {
    fn from(e: serde_json::Error) -> Self {
        LoanbookError::SerializationError(e.to_string())
    }
}
