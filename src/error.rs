use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("booking is missing {0}")]
    IncompleteBooking(&'static str),
    #[error("property snapshot is missing {0}")]
    MissingPropertySnapshot(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("booking not found: {0}")]
    BookingNotFound(String),
    #[error("property not found: {0}")]
    PropertyNotFound(String),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("payment succeeded without a payment id")]
    PaymentIdMissing,
    #[error("payment failed ({code}): {message}")]
    PaymentFailed { code: i32, message: String },
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::NetworkFailure(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
