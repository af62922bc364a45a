use idp_store::DocumentStore;
use idp_types::{Criteria, DocumentFacts, DocumentRecord, ListField, ScalarField};

use crate::error::Error;

/// Outcome of a resolve: either a registered record matched one of the
/// three probes, or none did. `NotFound` is a normal outcome, not an error
/// (spec.md §4.4) — modeled as a sum type rather than exception-as-control-
/// flow, per the redesign flag in spec.md §9.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(DocumentRecord),
    NotFound,
}

/// Resolve `facts` against `store` using the three-tiered probe (Issue+V2,
/// Issue, AOP), stopping at the first hit. Grounded on
/// `controller.py::_get_registered_document_data`.
pub fn resolve(store: &DocumentStore, facts: &DocumentFacts) -> Result<Resolution, Error> {
    enforce_discriminator_floor(facts)?;

    for criteria in probes(facts) {
        let mut matches = store.find_matching(&criteria)?;
        matches.sort_by(|a, b| a.updated.cmp(&b.updated));
        if let Some(hit) = matches.pop() {
            // Freshness guard: re-fetch by v3 in case a concurrent write
            // landed between the probe and now.
            let fresh = store.find_by_id(&hit.v3)?.unwrap_or(hit);
            return Ok(Resolution::Found(fresh));
        }
    }

    Ok(Resolution::NotFound)
}

/// spec.md §4.4 precondition: if every rich discriminator is empty,
/// `partialBody` must carry a value, else the pipeline cannot possibly
/// disambiguate this submission.
fn enforce_discriminator_floor(facts: &DocumentFacts) -> Result<(), Error> {
    if facts.needs_partial_body_fallback() && facts.partial_body.is_empty() {
        return Err(Error::NotEnoughDiscriminators);
    }
    Ok(())
}

fn probes(facts: &DocumentFacts) -> Vec<Criteria> {
    let mut probes = Vec::with_capacity(3);
    if !facts.v2.is_empty() {
        probes.push(issue_criteria(facts).eq(ScalarField::V2, facts.v2.clone()));
    }
    probes.push(issue_criteria(facts));
    probes.push(aop_criteria(facts));
    probes
}

/// Issue-level scalars plus pub year, collab, surnames and the list-OR
/// groups (spec.md §4.4 probe 1/2).
fn issue_criteria(facts: &DocumentFacts) -> Criteria {
    with_common_constraints(Criteria::new(), facts)
        .eq(ScalarField::PubYear, facts.pub_year.clone())
        .eq(ScalarField::Volume, facts.volume.clone())
        .eq(ScalarField::Number, facts.number.clone())
        .eq(ScalarField::Suppl, facts.suppl.clone())
        .eq(ScalarField::ElocationId, facts.elocation_id.clone())
        .eq(ScalarField::Fpage, facts.fpage.clone())
        .eq(ScalarField::FpageSeq, facts.fpage_seq.clone())
        .eq(ScalarField::Lpage, facts.lpage.clone())
}

/// Issue-level scalars dropped entirely, `pubYear` dropped, `collab` not
/// carried over (spec.md §4.4 probe 3 names only "list-value groups and
/// surnames kept"): models a document first registered as Ahead-Of-Print.
/// `Store::find_matching` already skips an equality on an empty value, so
/// there is nothing to gain from forcing these fields to `""` explicitly.
fn aop_criteria(facts: &DocumentFacts) -> Criteria {
    with_list_and_body_constraints(Criteria::new().eq(ScalarField::Surnames, facts.surnames()), facts)
}

fn with_common_constraints(criteria: Criteria, facts: &DocumentFacts) -> Criteria {
    let criteria = criteria.eq(ScalarField::Collab, facts.collab.clone()).eq(ScalarField::Surnames, facts.surnames());
    with_list_and_body_constraints(criteria, facts)
}

fn with_list_and_body_constraints(criteria: Criteria, facts: &DocumentFacts) -> Criteria {
    let mut criteria = criteria;
    if facts.needs_partial_body_fallback() {
        criteria = criteria.eq(ScalarField::PartialBody, facts.partial_body.clone());
    }
    criteria
        .or_values(ListField::IssnValue, facts.issns.iter().map(|i| i.value.clone()).collect())
        .or_values(ListField::DoiValue, facts.doi_with_lang.iter().map(|d| d.value.clone()).collect())
        .or_values(ListField::ArticleTitleText, facts.article_titles.iter().map(|t| t.text.clone()).collect())
}

#[cfg(test)]
mod tests {
    use idp_types::{DocumentFactsInput, RawAuthor, RawIssn};
    use time::OffsetDateTime;

    use super::*;

    fn facts_with(issue: bool) -> DocumentFacts {
        DocumentFacts::from_input(DocumentFactsInput {
            issns: vec![RawIssn { issn_type: "epub".into(), value: "1234-9876".into() }],
            pub_year: "2022".into(),
            authors: vec![RawAuthor { surname: "silva".into(), ..Default::default() }],
            volume: if issue { "10".into() } else { String::new() },
            ..Default::default()
        })
        .unwrap()
    }

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        (dir, store)
    }

    #[test]
    fn rejects_without_any_discriminator() {
        let facts = DocumentFacts::from_input(DocumentFactsInput {
            issns: vec![RawIssn { issn_type: "epub".into(), value: "1234-9876".into() }],
            pub_year: "2022".into(),
            ..Default::default()
        })
        .unwrap();
        let (_dir, store) = store();
        assert!(matches!(resolve(&store, &facts), Err(Error::NotEnoughDiscriminators)));
    }

    #[test]
    fn not_found_when_store_is_empty() {
        let (_dir, store) = store();
        let resolution = resolve(&store, &facts_with(true)).unwrap();
        assert!(matches!(resolution, Resolution::NotFound));
    }

    #[test]
    fn finds_issue_match_by_surnames_and_issn() {
        let (_dir, store) = store();
        let facts = facts_with(true);
        let record = DocumentRecord::compose(&facts, "V2A".into(), "V3A".into(), String::new(), "<article/>".into(), None, OffsetDateTime::now_utc());
        store.upsert(&record, true).unwrap();

        let resolution = resolve(&store, &facts).unwrap();
        match resolution {
            Resolution::Found(found) => assert_eq!(found.v3, "V3A"),
            Resolution::NotFound => panic!("expected a match"),
        }
    }

    #[test]
    fn aop_probe_matches_registered_aop_document_resubmitted_with_issue() {
        let (_dir, store) = store();
        let aop_facts = facts_with(false);
        let record = DocumentRecord::compose(&aop_facts, "V2A".into(), "V3A".into(), String::new(), "<article/>".into(), None, OffsetDateTime::now_utc());
        store.upsert(&record, true).unwrap();

        let resubmitted = facts_with(true);
        let resolution = resolve(&store, &resubmitted).unwrap();
        match resolution {
            Resolution::Found(found) => assert_eq!(found.v3, "V3A"),
            Resolution::NotFound => panic!("expected the AOP probe to match"),
        }
    }
}
