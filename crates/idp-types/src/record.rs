use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::facts::{ArticleTitle, Author, DocumentFacts, DoiWithLang, Issn};

/// A registered document, the persisted counterpart of `DocumentFacts`.
///
/// Grounded on `scielo_core.id_provider.models.Package`. Record identity is
/// `v3`; it is assigned once by the Identifier Allocator and never changes
/// (spec.md §3, tested by property 3 in spec.md §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub v2: String,
    pub v3: String,
    pub aop_pid: String,
    pub issns: Vec<Issn>,
    pub pub_year: String,
    pub doi_with_lang: Vec<DoiWithLang>,
    pub authors: Vec<Author>,
    pub collab: String,
    pub article_titles: Vec<ArticleTitle>,
    pub surnames: String,
    pub volume: String,
    pub number: String,
    pub suppl: String,
    pub elocation_id: String,
    pub fpage: String,
    pub fpage_seq: String,
    pub lpage: String,
    pub partial_body: String,
    pub extra: serde_json::Map<String, serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
    /// The package's serialized XML, stored as a string field on the
    /// record rather than as a GridFS file (spec.md §9, consolidating the
    /// source's diverging revisions on the newest semantics).
    pub xml: String,
}

impl DocumentRecord {
    /// Build the record that should be written for `facts` with the
    /// resolved `(v2, v3, aop_pid)` triple, merging list-valued fields with
    /// any previously registered record the way
    /// `Package.update_doi/update_authors/update_issns/update_article_titles`
    /// do: replace-by-key rather than blind append.
    pub fn compose(
        facts: &DocumentFacts,
        v2: String,
        v3: String,
        aop_pid: String,
        xml: String,
        previous: Option<&DocumentRecord>,
        now: OffsetDateTime,
    ) -> DocumentRecord {
        let issns = merge_by_key(previous.map(|p| p.issns.as_slice()), &facts.issns, |i| {
            i.issn_type.to_string()
        });
        let doi_with_lang =
            merge_by_key(previous.map(|p| p.doi_with_lang.as_slice()), &facts.doi_with_lang, |d| {
                d.lang.clone()
            });
        let authors = merge_by_key(previous.map(|p| p.authors.as_slice()), &facts.authors, |a| {
            format!("{}\u{0}{}", a.surname, a.given_names)
        });
        let article_titles =
            merge_by_key(previous.map(|p| p.article_titles.as_slice()), &facts.article_titles, |t| {
                t.lang.clone()
            });

        let surnames = authors.iter().map(|a| a.surname.as_str()).collect::<Vec<_>>().join(" ");

        DocumentRecord {
            v2,
            v3,
            aop_pid,
            issns,
            pub_year: facts.pub_year.clone(),
            doi_with_lang,
            authors,
            collab: facts.collab.clone(),
            article_titles,
            surnames,
            volume: facts.volume.clone(),
            number: facts.number.clone(),
            suppl: facts.suppl.clone(),
            elocation_id: facts.elocation_id.clone(),
            fpage: facts.fpage.clone(),
            fpage_seq: facts.fpage_seq.clone(),
            lpage: facts.lpage.clone(),
            partial_body: facts.partial_body.clone(),
            extra: previous.map(|p| p.extra.clone()).unwrap_or_default(),
            created: previous.map(|p| p.created).unwrap_or(now),
            updated: now,
            xml,
        }
    }
}

/// Replace-by-key merge: items already registered keep their position
/// unless the incoming facts carry a new value for the same key, in which
/// case the incoming value wins; brand-new keys are appended.
fn merge_by_key<T: Clone, K: Eq>(previous: Option<&[T]>, incoming: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut merged: Vec<T> = previous.map(|p| p.to_vec()).unwrap_or_default();
    for item in incoming {
        let k = key(item);
        if let Some(slot) = merged.iter_mut().find(|existing| key(existing) == k) {
            *slot = item.clone();
        } else {
            merged.push(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{DocumentFactsInput, RawAuthor, RawIssn};

    fn facts() -> DocumentFacts {
        DocumentFacts::from_input(DocumentFactsInput {
            issns: vec![RawIssn { issn_type: "epub".into(), value: "1234-9876".into() }],
            pub_year: "2022".into(),
            authors: vec![RawAuthor { surname: "silva".into(), given_names: "am".into(), ..Default::default() }],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn compose_without_previous_seeds_surnames_and_created() {
        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord::compose(&facts(), "V2".into(), "V3".into(), String::new(), "<xml/>".into(), None, now);
        assert_eq!(record.surnames, "SILVA");
        assert_eq!(record.created, now);
        assert_eq!(record.updated, now);
    }

    #[test]
    fn compose_merges_authors_by_surname_and_given_names() {
        let now = OffsetDateTime::now_utc();
        let previous = DocumentRecord::compose(&facts(), "V2".into(), "V3".into(), String::new(), "<xml/>".into(), None, now);

        let mut updated_facts = facts();
        updated_facts.authors[0].given_names = "A.M.".into();
        let later = now + time::Duration::seconds(1);
        let record =
            DocumentRecord::compose(&updated_facts, "V2".into(), "V3".into(), String::new(), "<xml/>".into(), Some(&previous), later);

        assert_eq!(record.authors.len(), 1);
        assert_eq!(record.authors[0].given_names, "A.M.");
        assert_eq!(record.created, now);
        assert_eq!(record.updated, later);
    }
}
