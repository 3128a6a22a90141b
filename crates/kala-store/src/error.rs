#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidQuery(msg.into())
    }
}
