use idp_types::{Code, ErrorCode};

/// Everything the Identifier Allocator, Dedup Resolver and Request Pipeline
/// can fail with (spec.md §7), grounded on `index-scheduler::error::Error`'s
/// `is_recoverable` split: store/IO failures are worth a caller retry,
/// everything else is a terminal rejection of the input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML could not be parsed: {0}")]
    InvalidXml(#[from] idp_xml::XmlError),
    #[error("a document must carry at least one of doi/authors/collab/titles, or a partial body")]
    NotEnoughDiscriminators,
    #[error("the resolved document is already published in an issue; it may not be re-registered as AOP")]
    NotAllowedAopInput,
    #[error("cannot allocate a v2 identifier without an ISSN and publication year")]
    CannotAllocateV2,
    #[error("exhausted {0} attempts generating a unique identifier")]
    AllocatorExhausted(u32),
    #[error(transparent)]
    Store(#[from] idp_store::StoreError),
    #[error("failed to persist the document after retrying the allocation")]
    SavingError,
}

impl Error {
    /// Whether the Request Pipeline should retry the operation (bounded, at
    /// the allocation layer) instead of surfacing the error to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Store(idp_store::StoreError::NotUnique(_)))
    }
}

impl ErrorCode for Error {
    fn error_code(&self) -> Code {
        match self {
            Error::InvalidXml(_) => Code::InvalidXml,
            Error::NotEnoughDiscriminators => Code::NotEnoughDiscriminators,
            Error::NotAllowedAopInput => Code::NotAllowedAopInput,
            Error::CannotAllocateV2 => Code::CannotAllocateV2,
            Error::AllocatorExhausted(_) => Code::CannotAllocateV2,
            Error::Store(store_error) => store_error.error_code(),
            Error::SavingError => Code::SavingError,
        }
    }
}
