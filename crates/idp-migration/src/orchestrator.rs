use idp_core::PipelineOutcome;
use idp_store::DocumentStore;
use idp_types::{DocumentFacts, Migration, MigrationStatus};
use time::OffsetDateTime;

use crate::config::Config;
use crate::error::Error;
use crate::pull;
use crate::store::MigrationStore;

/// Stage 1: idempotent seed/re-seed of a row, grounded on
/// `migration.controller.save_migration`'s skip/overwrite split (already
/// captured by `Migration::seed`/`re_seed`).
pub fn register_migration(
    store: &MigrationStore,
    v2: String,
    aop_pid: String,
    is_aop: bool,
    file_path: String,
    issn: String,
    year: String,
    order: String,
    v91: String,
    v93: String,
    skip_update: bool,
    now: OffsetDateTime,
) -> Result<(), Error> {
    match store.find_by_v2(&v2)? {
        Some(mut existing) if skip_update => {
            existing.updated = now;
            store.upsert(&existing)
        }
        Some(mut existing) => {
            existing.re_seed(aop_pid, is_aop, file_path, issn, year, order, v91, v93, now);
            store.upsert(&existing)
        }
        None => {
            let migration = Migration::seed(0, v2, aop_pid, is_aop, file_path, issn, year, order, v91, v93, now);
            store.upsert(&migration)
        }
    }
}

/// Stage 2: pull the XML from one of the three sources, then request an
/// identifier for it, transitioning `CREATED -> XML -> MIGRATED` or
/// `-> FAILED` (spec.md §4.6).
pub fn pull_and_request_id(
    migration_store: &MigrationStore,
    document_store: &DocumentStore,
    http_client: &reqwest::blocking::Client,
    config: &Config,
    v2: &str,
    user: &str,
) -> Result<(), Error> {
    let mut migration = migration_store.find_by_v2(v2)?.ok_or_else(|| Error::NotFound(v2.to_string()))?;

    let pulled = match pull::pull(http_client, config, &migration) {
        Ok(pulled) => pulled,
        Err(err) => {
            fail(migration_store, &mut migration, err.to_string())?;
            return Err(err);
        }
    };

    let now = OffsetDateTime::now_utc();
    migration.xml = String::from_utf8_lossy(&pulled.xml).into_owned();
    migration.source = Some(pulled.source);
    migration.transition(MigrationStatus::Xml, String::new(), now)?;
    migration_store.upsert(&migration)?;

    let facts = match parse_facts(pulled.xml) {
        Ok(facts) => facts,
        Err(err) => {
            fail(migration_store, &mut migration, err.to_string())?;
            return Err(err);
        }
    };

    match idp_core::request_id(document_store, facts, user) {
        Ok(PipelineOutcome::Rewritten(xml)) => {
            migration.xml = String::from_utf8_lossy(&xml).into_owned();
        }
        Ok(PipelineOutcome::NoChange) => {}
        Err(err) => {
            fail(migration_store, &mut migration, err.to_string())?;
            return Err(err.into());
        }
    }

    if let Some(record) = document_store.find_by_v2(v2)? {
        migration.v3 = record.v3;
    }
    let now = OffsetDateTime::now_utc();
    migration.transition(MigrationStatus::Migrated, String::new(), now)?;
    migration_store.upsert(&migration)
}

/// Stage 3: revert a migrated row back to `XML`, copying the registered
/// document's XML back onto the row so it can be re-pulled and re-requested
/// (spec.md §4.6 UndoIdRequest).
pub fn undo_id_request(migration_store: &MigrationStore, document_store: &DocumentStore, v2: &str) -> Result<(), Error> {
    let mut migration = migration_store.find_by_v2(v2)?.ok_or_else(|| Error::NotFound(v2.to_string()))?;
    let record = document_store.find_by_v2(v2)?.ok_or_else(|| Error::NotFound(v2.to_string()))?;

    migration.xml = record.xml;
    let now = OffsetDateTime::now_utc();
    migration.transition(MigrationStatus::Xml, "id request undone".to_string(), now)?;
    migration_store.upsert(&migration)
}

fn fail(migration_store: &MigrationStore, migration: &mut Migration, message: String) -> Result<(), Error> {
    let now = OffsetDateTime::now_utc();
    migration.transition(MigrationStatus::Failed, message, now)?;
    migration_store.upsert(migration)
}

fn parse_facts(xml: Vec<u8>) -> Result<DocumentFacts, Error> {
    let input = idp_xml::parse_bytes(xml)?;
    Ok(DocumentFacts::from_input(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration_store() -> (tempfile::TempDir, MigrationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MigrationStore::open(dir.path(), 10 * 1024 * 1024).unwrap();
        (dir, store)
    }

    #[test]
    fn register_migration_seeds_a_new_row() {
        let (_dir, store) = migration_store();
        register_migration(&store, "V2A".into(), String::new(), false, "a.xml".into(), "1234-9876".into(), "2022".into(), "1".into(), String::new(), String::new(), false, OffsetDateTime::now_utc()).unwrap();

        let row = store.find_by_v2("V2A").unwrap().unwrap();
        assert_eq!(row.status, MigrationStatus::Created);
        assert_eq!(row.issn, "1234-9876");
    }

    #[test]
    fn register_migration_skip_update_preserves_descriptor_fields() {
        let (_dir, store) = migration_store();
        register_migration(&store, "V2A".into(), String::new(), false, "a.xml".into(), "1234-9876".into(), "2022".into(), "1".into(), String::new(), String::new(), false, OffsetDateTime::now_utc()).unwrap();
        register_migration(&store, "V2A".into(), String::new(), false, "changed.xml".into(), "0000-0000".into(), "2023".into(), "2".into(), String::new(), String::new(), true, OffsetDateTime::now_utc()).unwrap();

        let row = store.find_by_v2("V2A").unwrap().unwrap();
        assert_eq!(row.file_path, "a.xml");
        assert_eq!(row.issn, "1234-9876");
    }

    #[test]
    fn undo_id_request_reverts_a_migrated_row_to_xml() {
        let (_dir, store) = migration_store();
        let doc_dir = tempfile::tempdir().unwrap();
        let document_store = DocumentStore::open(doc_dir.path(), 10 * 1024 * 1024).unwrap();

        let mut migration = Migration::seed(0, "V2A".into(), String::new(), false, "a.xml".into(), "1234-9876".into(), "2022".into(), "1".into(), String::new(), String::new(), OffsetDateTime::now_utc());
        migration.transition(MigrationStatus::Xml, String::new(), OffsetDateTime::now_utc()).unwrap();
        migration.transition(MigrationStatus::Migrated, String::new(), OffsetDateTime::now_utc()).unwrap();
        store.upsert(&migration).unwrap();

        let record = idp_types::DocumentRecord::compose(
            &facts_for_undo(),
            "V2A".into(),
            "AAAAAAAAAAAAAAAAAAAAAAA".into(),
            String::new(),
            "<article/>".into(),
            None,
            OffsetDateTime::now_utc(),
        );
        document_store.upsert(&record, true).unwrap();

        undo_id_request(&store, &document_store, "V2A").unwrap();

        let row = store.find_by_v2("V2A").unwrap().unwrap();
        assert_eq!(row.status, MigrationStatus::Xml);
        assert_eq!(row.xml, "<article/>");
    }

    fn facts_for_undo() -> DocumentFacts {
        use idp_types::{DocumentFactsInput, RawIssn};
        DocumentFacts::from_input(DocumentFactsInput {
            v2: "V2A".into(),
            issns: vec![RawIssn { issn_type: "epub".into(), value: "1234-9876".into() }],
            pub_year: "2022".into(),
            xml: b"<article/>".to_vec(),
            ..Default::default()
        })
        .unwrap()
    }
}
