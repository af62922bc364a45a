use std::fmt;

use serde::{Deserialize, Serialize};

/// The four ISSN kinds a SciELO issue may carry.
///
/// Mirrors `ISSN_TYPES` in the original `scielo_core.id_provider.models`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssnType {
    Epub,
    Ppub,
    L,
    ScieloId,
}

impl fmt::Display for IssnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssnType::Epub => "epub",
            IssnType::Ppub => "ppub",
            IssnType::L => "l",
            IssnType::ScieloId => "scielo-id",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for IssnType {
    type Err = FactsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "epub" => Ok(IssnType::Epub),
            "ppub" => Ok(IssnType::Ppub),
            "l" => Ok(IssnType::L),
            "scielo-id" => Ok(IssnType::ScieloId),
            other => Err(FactsError::UnknownIssnType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issn {
    #[serde(rename = "type")]
    pub issn_type: IssnType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoiWithLang {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Author {
    pub surname: String,
    pub given_names: String,
    pub prefix: String,
    pub suffix: String,
    pub orcid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTitle {
    pub lang: String,
    pub text: String,
}

/// Raw, un-normalized ISSN as handed over by the XML Adapter.
#[derive(Debug, Clone)]
pub struct RawIssn {
    pub issn_type: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct RawDoiWithLang {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct RawAuthor {
    pub surname: String,
    pub given_names: String,
    pub prefix: String,
    pub suffix: String,
    pub orcid: String,
}

#[derive(Debug, Clone)]
pub struct RawArticleTitle {
    pub lang: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FactsError {
    #[error("unknown ISSN type `{0}`")]
    UnknownIssnType(String),
    #[error("a document must carry at least one ISSN")]
    MissingIssns,
    #[error("a document must carry a publication year")]
    MissingPubYear,
}

/// Everything the XML Adapter extracts from one package, before the
/// normalization rules (uppercasing, truncation) are applied.
///
/// This is the Rust analogue of the keyword arguments threaded through
/// `scielo_core.id_provider.controller._request_document_ids` and turned
/// into a `Document` there.
#[derive(Debug, Clone, Default)]
pub struct DocumentFactsInput {
    pub v2: String,
    pub v3: String,
    pub aop_pid: String,
    pub issns: Vec<RawIssn>,
    pub pub_year: String,
    pub doi_with_lang: Vec<RawDoiWithLang>,
    pub authors: Vec<RawAuthor>,
    pub collab: String,
    pub article_titles: Vec<RawArticleTitle>,
    pub volume: String,
    pub number: String,
    pub suppl: String,
    pub elocation_id: String,
    pub fpage: String,
    pub fpage_seq: String,
    pub lpage: String,
    pub partial_body: String,
    pub xml: Vec<u8>,
    pub zip_path: String,
}

/// The normalized, duplication-tolerant view of a submission used for
/// dedup (spec.md §3). Absent identifiers/scalars are the empty string,
/// following the convention of the original `scielo_core` models, where a
/// missing value is `''` rather than `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFacts {
    pub v2: String,
    pub v3: String,
    pub aop_pid: String,
    pub issns: Vec<Issn>,
    pub pub_year: String,
    pub doi_with_lang: Vec<DoiWithLang>,
    pub authors: Vec<Author>,
    pub collab: String,
    pub article_titles: Vec<ArticleTitle>,
    pub volume: String,
    pub number: String,
    pub suppl: String,
    pub elocation_id: String,
    pub fpage: String,
    pub fpage_seq: String,
    pub lpage: String,
    pub partial_body: String,
    #[serde(skip)]
    pub xml: Vec<u8>,
    pub zip_path: String,
}

/// Collapse runs of whitespace and cap the result at 500 uppercase chars.
///
/// Grounded on `controller.py::_standardize_partial_body`.
pub fn standardize_partial_body(body: &str) -> String {
    let joined: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let upper = joined.to_uppercase();
    upper.chars().take(500).collect()
}

impl DocumentFacts {
    /// Normalize a raw extraction into `DocumentFacts`, applying the
    /// uppercasing rules from `controller.py::Document.__init__` and
    /// checking the two structural invariants from spec.md §3 (non-empty
    /// `issns`, non-empty `pub_year`). The discriminator-floor invariant
    /// (at least one of doi/authors/collab/titles, else `partial_body`) is
    /// the Dedup Resolver's precondition, not a construction-time error.
    pub fn from_input(input: DocumentFactsInput) -> Result<Self, FactsError> {
        if input.issns.is_empty() {
            return Err(FactsError::MissingIssns);
        }
        if input.pub_year.is_empty() {
            return Err(FactsError::MissingPubYear);
        }

        let issns = input
            .issns
            .into_iter()
            .map(|i| -> Result<Issn, FactsError> {
                Ok(Issn { issn_type: i.issn_type.parse()?, value: i.value.to_uppercase() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let doi_with_lang = input
            .doi_with_lang
            .into_iter()
            .map(|d| DoiWithLang { lang: d.lang, value: d.value.to_uppercase() })
            .collect();

        let authors = input
            .authors
            .into_iter()
            .map(|a| Author {
                surname: a.surname.to_uppercase(),
                given_names: a.given_names,
                prefix: a.prefix,
                suffix: a.suffix,
                orcid: a.orcid,
            })
            .collect();

        let article_titles = input
            .article_titles
            .into_iter()
            .map(|t| ArticleTitle { lang: t.lang, text: t.text.to_uppercase() })
            .collect();

        Ok(DocumentFacts {
            v2: input.v2.to_uppercase(),
            v3: input.v3,
            aop_pid: input.aop_pid.to_uppercase(),
            issns,
            pub_year: input.pub_year.to_uppercase(),
            doi_with_lang,
            authors,
            collab: input.collab.to_uppercase(),
            article_titles,
            volume: input.volume.to_uppercase(),
            number: input.number.to_uppercase(),
            suppl: input.suppl.to_uppercase(),
            elocation_id: input.elocation_id.to_uppercase(),
            fpage: input.fpage.to_uppercase(),
            fpage_seq: input.fpage_seq.to_uppercase(),
            lpage: input.lpage.to_uppercase(),
            partial_body: standardize_partial_body(&input.partial_body),
            xml: input.xml,
            zip_path: input.zip_path,
        })
    }

    /// Space-joined, uppercased surnames, as stored on `DocumentRecord`.
    ///
    /// Grounded on `models.Package._get_surnames`, which does not filter
    /// out blank surnames (see DESIGN.md Open Question #3).
    pub fn surnames(&self) -> String {
        self.authors.iter().map(|a| a.surname.as_str()).collect::<Vec<_>>().join(" ")
    }

    /// True when the document has no issue placement at all (AOP form).
    pub fn has_issue_placement(&self) -> bool {
        !self.volume.is_empty() || !self.number.is_empty() || !self.suppl.is_empty()
    }

    /// True when none of the rich discriminators (doi/authors/collab/titles)
    /// are present and a `partial_body` fallback is required.
    pub fn needs_partial_body_fallback(&self) -> bool {
        self.doi_with_lang.is_empty()
            && self.authors.is_empty()
            && self.collab.is_empty()
            && self.article_titles.is_empty()
    }

    /// Prefer `epub`, then `ppub`, per spec.md §4.5 `pickIssn`.
    pub fn pick_issn(&self) -> Option<&str> {
        self.issns
            .iter()
            .find(|i| i.issn_type == IssnType::Epub)
            .or_else(|| self.issns.iter().find(|i| i.issn_type == IssnType::Ppub))
            .map(|i| i.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> DocumentFactsInput {
        DocumentFactsInput {
            issns: vec![RawIssn { issn_type: "epub".into(), value: "1234-9876".into() }],
            pub_year: "2022".into(),
            authors: vec![RawAuthor { surname: "silva".into(), given_names: "AM".into(), ..Default::default() }],
            article_titles: vec![RawArticleTitle { lang: "en".into(), text: "this is an article".into() }],
            ..Default::default()
        }
    }

    #[test]
    fn normalizes_and_uppercases() {
        let facts = DocumentFacts::from_input(base_input()).unwrap();
        assert_eq!(facts.issns[0].value, "1234-9876".to_uppercase());
        assert_eq!(facts.authors[0].surname, "SILVA");
        assert_eq!(facts.article_titles[0].text, "THIS IS AN ARTICLE");
        assert_eq!(facts.surnames(), "SILVA");
    }

    #[test]
    fn rejects_missing_issns() {
        let mut input = base_input();
        input.issns.clear();
        assert!(matches!(DocumentFacts::from_input(input), Err(FactsError::MissingIssns)));
    }

    #[test]
    fn rejects_missing_pub_year() {
        let mut input = base_input();
        input.pub_year.clear();
        assert!(matches!(DocumentFacts::from_input(input), Err(FactsError::MissingPubYear)));
    }

    #[test]
    fn partial_body_is_collapsed_upper_and_capped() {
        let long = "a ".repeat(400);
        let collapsed = standardize_partial_body(&long);
        assert!(collapsed.len() <= 500);
        assert_eq!(collapsed, collapsed.to_uppercase());
        assert!(!collapsed.contains("  "));
    }

    #[test]
    fn pick_issn_prefers_epub_over_ppub() {
        let mut input = base_input();
        input.issns = vec![
            RawIssn { issn_type: "ppub".into(), value: "1111-1111".into() },
            RawIssn { issn_type: "epub".into(), value: "2222-2222".into() },
        ];
        let facts = DocumentFacts::from_input(input).unwrap();
        assert_eq!(facts.pick_issn(), Some("2222-2222"));
    }
}
