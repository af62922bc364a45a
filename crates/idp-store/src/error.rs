use idp_types::{Code, ErrorCode};

/// Everything the Document Store (§4.3) can fail with.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] heed::Error),
    #[error("record with v3 `{0}` already exists")]
    NotUnique(String),
    #[error("no record found for v3 `{0}`")]
    NotFound(String),
    #[error("failed to (de)serialize a stored record: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> Code {
        match self {
            StoreError::Unavailable(_) => Code::StoreUnavailable,
            StoreError::NotUnique(_) => Code::NotUnique,
            StoreError::NotFound(_) => Code::DocumentNotFound,
            StoreError::Codec(_) => Code::StoreUnavailable,
        }
    }
}
