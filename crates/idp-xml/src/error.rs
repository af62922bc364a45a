use idp_types::{Code, ErrorCode};

/// Everything the XML Adapter (§4.1) can fail with.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("package `{0}` is neither a valid ZIP nor well-formed XML")]
    InvalidXml(String),
    #[error("ZIP package `{0}` does not contain exactly one XML member")]
    BadPackage(String),
    #[error("failed to read package `{path}`: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

impl ErrorCode for XmlError {
    fn error_code(&self) -> Code {
        match self {
            XmlError::InvalidXml(_) => Code::InvalidXml,
            XmlError::BadPackage(_) => Code::InvalidXml,
            XmlError::Io { .. } => Code::InvalidXml,
        }
    }
}
