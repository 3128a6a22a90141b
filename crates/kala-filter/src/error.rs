#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// No write whitelist is configured, so writes are switched off.
    #[error("writes are disabled")]
    WriteDisabled,

    #[error("invalid sort: {0}")]
    InvalidSort(String),
}
