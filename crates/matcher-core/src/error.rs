use thiserror::Error;

/// Hint attached to errors raised when no model could be built.
pub const RETRAIN_HINT: &str = "the TF-IDF model may not be trained; run `matcher train`";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("no worker has usable bio text after preprocessing")]
    EmptyCorpus,

    #[error("model not trained: {0}")]
    ModelNotTrained(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Boundary class an error is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    ServiceUnavailable,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::BadRequest,
            Self::ResourceUnavailable(_) | Self::EmptyCorpus | Self::ModelNotTrained(_) => {
                ErrorKind::ServiceUnavailable
            }
            _ => ErrorKind::Internal,
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EmptyCorpus | Self::ModelNotTrained(_) => Some(RETRAIN_HINT),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
