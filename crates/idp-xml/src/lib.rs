//! XML Adapter: package loading, fact extraction and identifier rewriting.

mod error;
mod extract;
mod package;
mod rewrite;

use std::path::Path;

use idp_types::DocumentFactsInput;

pub use error::XmlError;
pub use rewrite::rewrite_ids;

/// Load and parse one package, returning the raw extracted facts alongside
/// the bytes they were parsed from (spec.md §4.1 `parse`).
pub fn parse(path: &Path) -> Result<DocumentFactsInput, XmlError> {
    let xml = package::load(path)?;
    let mut facts = extract::extract(&xml)?;
    facts.xml = xml;
    Ok(facts)
}

/// Parse already-loaded XML bytes, for callers that source the package from
/// somewhere other than the filesystem (e.g. the Migration Orchestrator's
/// HTTP pull sources).
pub fn parse_bytes(xml: Vec<u8>) -> Result<DocumentFactsInput, XmlError> {
    let mut facts = extract::extract(&xml)?;
    facts.xml = xml;
    Ok(facts)
}
