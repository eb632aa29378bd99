use super::DocPath;

#[derive(Debug)]
pub enum StoreError {
    NotFound(DocPath),
    AlreadyExists(DocPath),
    /// A document read inside a transaction changed before commit.
    Conflict(DocPath),
    InvalidPath(String),
    LimitExceeded(&'static str),
    Decode(String),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(path) => write!(f, "not found: {path}"),
            StoreError::AlreadyExists(path) => write!(f, "already exists: {path}"),
            StoreError::Conflict(path) => write!(f, "transaction conflict on {path}"),
            StoreError::InvalidPath(msg) => write!(f, "invalid path: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Decode(msg) => write!(f, "decode error: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
