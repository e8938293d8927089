use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Semantic patch-contract violations, in evaluation order.
    #[error("invalid UI patch contract: {}", .0.join(" "))]
    Contract(Vec<String>),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    #[must_use]
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
