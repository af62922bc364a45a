use http::StatusCode;

/// Broad category of an error, surfaced alongside its `Code` the way
/// `meilisearch-types::error::ErrorType` accompanies `meilisearch-types::error::Code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Invalid,
    Forbidden,
    Internal,
    NotFound,
    Unavailable,
}

/// Anything that can be converted to a stable `Code`, mirroring
/// `meilisearch-types::error::ErrorCode`.
pub trait ErrorCode {
    fn error_code(&self) -> Code;

    fn error_type(&self) -> ErrorType {
        self.error_code().error_type()
    }

    fn status_code(&self) -> StatusCode {
        self.error_code().status_code()
    }
}

macro_rules! make_error_codes {
    ($($code_ident:ident, $error_type:ident, $status:ident;)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Code {
            $($code_ident),+
        }

        impl Code {
            pub fn error_type(&self) -> ErrorType {
                match self {
                    $(Code::$code_ident => ErrorType::$error_type),+
                }
            }

            pub fn status_code(&self) -> StatusCode {
                match self {
                    $(Code::$code_ident => StatusCode::$status),+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Code::$code_ident => stringify!($code_ident)),+
                }
            }
        }
    };
}

// One row per failure mode named in spec.md §7. `InvalidXml` through
// `NotAllowedAopInput` reject the request outright; `CannotAllocateV2`
// through `PullXmlFailed` are the pipeline's own recoverable/unrecoverable
// split (spec.md §4.5 step 6, §4.6).
make_error_codes! {
    InvalidXml,              Invalid,     BAD_REQUEST;
    NotEnoughDiscriminators, Invalid,     BAD_REQUEST;
    NotAllowedAopInput,      Forbidden,   FORBIDDEN;
    DocumentNotFound,        NotFound,    NOT_FOUND;
    MigrationNotFound,       NotFound,    NOT_FOUND;
    CannotAllocateV2,        Internal,    INTERNAL_SERVER_ERROR;
    NotUnique,               Internal,    CONFLICT;
    StoreUnavailable,        Unavailable, SERVICE_UNAVAILABLE;
    FetchFailed,             Unavailable, BAD_GATEWAY;
    SavingError,             Internal,    INTERNAL_SERVER_ERROR;
    PullXmlFailed,           Unavailable, BAD_GATEWAY;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_unique_is_internal_and_conflict() {
        assert_eq!(Code::NotUnique.error_type(), ErrorType::Internal);
        assert_eq!(Code::NotUnique.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn fetch_failed_is_unavailable() {
        assert_eq!(Code::FetchFailed.error_type(), ErrorType::Unavailable);
    }

    #[test]
    fn not_allowed_aop_input_is_forbidden() {
        assert_eq!(Code::NotAllowedAopInput.error_type(), ErrorType::Forbidden);
        assert_eq!(Code::NotAllowedAopInput.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn name_matches_variant() {
        assert_eq!(Code::InvalidXml.name(), "InvalidXml");
    }
}
