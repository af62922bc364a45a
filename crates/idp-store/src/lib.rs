//! Document Store: the `heed`-backed registry the Dedup Resolver queries.

mod codec;
mod error;
mod store;

pub use error::StoreError;
pub use store::DocumentStore;

#[cfg(test)]
mod tests {
    use idp_types::{Criteria, DocumentRecord, Issn, IssnType, ListField, Request, ScalarField};
    use time::OffsetDateTime;

    use super::*;

    fn sample(v2: &str, v3: &str, pub_year: &str) -> DocumentRecord {
        DocumentRecord {
            v2: v2.into(),
            v3: v3.into(),
            aop_pid: String::new(),
            issns: vec![Issn { issn_type: IssnType::Epub, value: "1234-9876".into() }],
            pub_year: pub_year.into(),
            doi_with_lang: vec![],
            authors: vec![],
            collab: String::new(),
            article_titles: vec![],
            surnames: "SILVA".into(),
            volume: String::new(),
            number: String::new(),
            suppl: String::new(),
            elocation_id: String::new(),
            fpage: String::new(),
            fpage_seq: String::new(),
            lpage: String::new(),
            partial_body: String::new(),
            extra: Default::default(),
            created: OffsetDateTime::now_utc(),
            updated: OffsetDateTime::now_utc(),
            xml: "<article/>".into(),
        }
    }

    #[test]
    fn upsert_then_find_by_id_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let record = sample("V2A", "V3A", "2022");
        store.upsert(&record, true).unwrap();

        assert!(store.exists_v3("V3A").unwrap());
        assert!(store.exists_v2("V2A").unwrap());
        assert_eq!(store.find_by_id("V3A").unwrap().unwrap().v2, "V2A");
    }

    #[test]
    fn upsert_rejects_duplicate_v3_when_expecting_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        store.upsert(&sample("V2A", "V3A", "2022"), true).unwrap();

        let err = store.upsert(&sample("V2B", "V3A", "2022"), true).unwrap_err();
        assert!(matches!(err, StoreError::NotUnique(_)));
    }

    #[test]
    fn upsert_updates_in_place_when_not_expecting_new() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        store.upsert(&sample("V2A", "V3A", "2022"), true).unwrap();

        let mut updated = sample("V2A-NEW", "V3A", "2022");
        updated.collab = "GROUP".into();
        store.upsert(&updated, false).unwrap();

        let record = store.find_by_id("V3A").unwrap().unwrap();
        assert_eq!(record.v2, "V2A-NEW");
        assert_eq!(record.collab, "GROUP");
        assert!(!store.exists_v2("V2A").unwrap());
    }

    #[test]
    fn find_matching_intersects_scalar_and_list_constraints() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        store.upsert(&sample("V2A", "V3A", "2022"), true).unwrap();
        store.upsert(&sample("V2B", "V3B", "2023"), true).unwrap();

        let criteria = Criteria::new()
            .eq(ScalarField::PubYear, "2022")
            .or_values(ListField::IssnValue, vec!["1234-9876".into()]);
        let matches = store.find_matching(&criteria).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].v3, "V3A");
    }

    #[test]
    fn request_log_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let id = store.next_request_id().unwrap();
        let now = OffsetDateTime::now_utc();
        let mut request = Request::new_pending(id, "tester".into(), String::new(), String::new(), String::new(), now);
        store.log_request(&request).unwrap();

        request.complete("V2A".into(), "V3A".into(), String::new(), now);
        store.update_request(&request).unwrap();
    }
}
