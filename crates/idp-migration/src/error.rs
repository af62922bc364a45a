use idp_types::{Code, ErrorCode};

/// Everything the Migration store and Orchestrator stages can fail with.
/// Grounded on `index-scheduler::error::Error`'s shape, adapted to the
/// pull/orchestrate surface this crate adds on top of `idp-core`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] heed::Error),
    #[error("no migration row found for v2 {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
    #[error("illegal migration transition: {0}")]
    Transition(#[from] idp_types::migration::TransitionError),
    #[error("all pull sources failed for pid {0:?}")]
    PullFailed(String),
    #[error(transparent)]
    RequestId(#[from] idp_core::Error),
    #[error(transparent)]
    Xml(#[from] idp_xml::XmlError),
    #[error(transparent)]
    Facts(#[from] idp_types::FactsError),
    #[error(transparent)]
    DocumentStore(#[from] idp_store::StoreError),
}

impl ErrorCode for Error {
    fn error_code(&self) -> Code {
        match self {
            Error::Store(_) => Code::StoreUnavailable,
            Error::NotFound(_) => Code::MigrationNotFound,
            Error::Codec(_) => Code::StoreUnavailable,
            Error::Transition(_) => Code::SavingError,
            Error::PullFailed(_) => Code::PullXmlFailed,
            Error::RequestId(inner) => inner.error_code(),
            Error::Xml(inner) => inner.error_code(),
            Error::Facts(_) => Code::InvalidXml,
            Error::DocumentStore(inner) => inner.error_code(),
        }
    }
}
