use http::StatusCode;
use kala_filter::FilterError;
use kala_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("writes are disabled")]
    WriteDisabled,

    #[error("document rejected by write filter")]
    Rejected,

    #[error("status endpoint is disabled")]
    StatusDisabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::WriteDisabled | HandlerError::Rejected | HandlerError::StatusDisabled => {
                StatusCode::FORBIDDEN
            }
            HandlerError::Store(StoreError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            HandlerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FilterError> for HandlerError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::WriteDisabled => HandlerError::WriteDisabled,
            FilterError::InvalidSort(msg) => HandlerError::BadRequest(format!("invalid sort: {msg}")),
        }
    }
}
