use thiserror::Error;

/// Failure taxonomy shared across the core.
///
/// The kinds matter to callers: a transient store failure must stay
/// distinguishable from "count is zero", a persistence failure suppresses all
/// downstream events for that record, and a delivery failure to one subscriber
/// never aborts delivery to the rest.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transient I/O failure: {0}")]
    Transient(#[source] anyhow::Error),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("delivery failure: {0}")]
    Delivery(String),
}

impl CoreError {
    pub fn transient<E: Into<anyhow::Error>>(err: E) -> Self {
        CoreError::Transient(err.into())
    }

    pub fn persistence<E: Into<anyhow::Error>>(err: E) -> Self {
        CoreError::Persistence(err.into())
    }
}
