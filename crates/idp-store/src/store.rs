use std::path::Path;

use heed::types::{DecodeIgnore, SerdeJson, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use idp_types::{Criteria, DocumentRecord, ListField, Request, ScalarField};
use roaring::RoaringBitmap;

use crate::codec::{RoaringBitmapCodec, BEU32};
use crate::error::StoreError;

/// Number of LMDB sub-databases opened by [`DocumentStore`].
const NUMBER_OF_DATABASES: u32 = 19;

mod db_name {
    pub const RECORDS: &str = "records";
    pub const BY_V3: &str = "by-v3";
    pub const BY_V2: &str = "by-v2";
    pub const IDX_AOP_PID: &str = "idx-aop-pid";
    pub const IDX_PUB_YEAR: &str = "idx-pub-year";
    pub const IDX_COLLAB: &str = "idx-collab";
    pub const IDX_SURNAMES: &str = "idx-surnames";
    pub const IDX_VOLUME: &str = "idx-volume";
    pub const IDX_NUMBER: &str = "idx-number";
    pub const IDX_SUPPL: &str = "idx-suppl";
    pub const IDX_ELOCATION_ID: &str = "idx-elocation-id";
    pub const IDX_FPAGE: &str = "idx-fpage";
    pub const IDX_FPAGE_SEQ: &str = "idx-fpage-seq";
    pub const IDX_LPAGE: &str = "idx-lpage";
    pub const IDX_PARTIAL_BODY: &str = "idx-partial-body";
    pub const IDX_ISSN_VALUE: &str = "idx-issn-value";
    pub const IDX_DOI_VALUE: &str = "idx-doi-value";
    pub const IDX_TITLE_TEXT: &str = "idx-title-text";
    pub const REQUESTS: &str = "requests";
}

/// `heed`-backed registry of `DocumentRecord`s with the secondary indexes
/// the Dedup Resolver's probes need (spec.md §4.3), grounded field-for-field
/// on `index-scheduler::queue::tasks::TaskQueue`: one `Database` per indexed
/// field, `RoaringBitmapCodec` postings for multi-valued/disjunctive
/// constraints, `SerdeJson` for the record payload, a `u32` internal id.
///
/// `authors.surname` is not given its own index: the Resolver only ever
/// queries the space-joined `surnames` field (never a single author), so
/// that aggregate index already satisfies every read path (DESIGN.md).
pub struct DocumentStore {
    env: Env,
    records: Database<BEU32, SerdeJson<DocumentRecord>>,
    by_v3: Database<Str, BEU32>,
    by_v2: Database<Str, BEU32>,
    idx_aop_pid: Database<Str, RoaringBitmapCodec>,
    idx_pub_year: Database<Str, RoaringBitmapCodec>,
    idx_collab: Database<Str, RoaringBitmapCodec>,
    idx_surnames: Database<Str, RoaringBitmapCodec>,
    idx_volume: Database<Str, RoaringBitmapCodec>,
    idx_number: Database<Str, RoaringBitmapCodec>,
    idx_suppl: Database<Str, RoaringBitmapCodec>,
    idx_elocation_id: Database<Str, RoaringBitmapCodec>,
    idx_fpage: Database<Str, RoaringBitmapCodec>,
    idx_fpage_seq: Database<Str, RoaringBitmapCodec>,
    idx_lpage: Database<Str, RoaringBitmapCodec>,
    idx_partial_body: Database<Str, RoaringBitmapCodec>,
    idx_issn_value: Database<Str, RoaringBitmapCodec>,
    idx_doi_value: Database<Str, RoaringBitmapCodec>,
    idx_title_text: Database<Str, RoaringBitmapCodec>,
    requests: Database<BEU32, SerdeJson<Request>>,
}

impl DocumentStore {
    pub fn open(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(heed::Error::Io)?;
        let env = unsafe { EnvOpenOptions::new().max_dbs(NUMBER_OF_DATABASES).map_size(map_size).open(path) }?;

        let env_for_txn = env.clone();
        let mut wtxn = env_for_txn.write_txn()?;
        let store = DocumentStore {
            records: env.create_database(&mut wtxn, Some(db_name::RECORDS))?,
            by_v3: env.create_database(&mut wtxn, Some(db_name::BY_V3))?,
            by_v2: env.create_database(&mut wtxn, Some(db_name::BY_V2))?,
            idx_aop_pid: env.create_database(&mut wtxn, Some(db_name::IDX_AOP_PID))?,
            idx_pub_year: env.create_database(&mut wtxn, Some(db_name::IDX_PUB_YEAR))?,
            idx_collab: env.create_database(&mut wtxn, Some(db_name::IDX_COLLAB))?,
            idx_surnames: env.create_database(&mut wtxn, Some(db_name::IDX_SURNAMES))?,
            idx_volume: env.create_database(&mut wtxn, Some(db_name::IDX_VOLUME))?,
            idx_number: env.create_database(&mut wtxn, Some(db_name::IDX_NUMBER))?,
            idx_suppl: env.create_database(&mut wtxn, Some(db_name::IDX_SUPPL))?,
            idx_elocation_id: env.create_database(&mut wtxn, Some(db_name::IDX_ELOCATION_ID))?,
            idx_fpage: env.create_database(&mut wtxn, Some(db_name::IDX_FPAGE))?,
            idx_fpage_seq: env.create_database(&mut wtxn, Some(db_name::IDX_FPAGE_SEQ))?,
            idx_lpage: env.create_database(&mut wtxn, Some(db_name::IDX_LPAGE))?,
            idx_partial_body: env.create_database(&mut wtxn, Some(db_name::IDX_PARTIAL_BODY))?,
            idx_issn_value: env.create_database(&mut wtxn, Some(db_name::IDX_ISSN_VALUE))?,
            idx_doi_value: env.create_database(&mut wtxn, Some(db_name::IDX_DOI_VALUE))?,
            idx_title_text: env.create_database(&mut wtxn, Some(db_name::IDX_TITLE_TEXT))?,
            requests: env.create_database(&mut wtxn, Some(db_name::REQUESTS))?,
            env,
        };
        wtxn.commit()?;
        Ok(store)
    }

    pub fn exists_v3(&self, v3: &str) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.by_v3.get(&rtxn, v3)?.is_some())
    }

    pub fn exists_v2(&self, v2: &str) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.by_v2.get(&rtxn, v2)?.is_some())
    }

    pub fn find_by_id(&self, v3: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        match self.by_v3.get(&rtxn, v3)? {
            Some(id) => Ok(self.records.get(&rtxn, &id)?),
            None => Ok(None),
        }
    }

    pub fn find_by_v2(&self, v2: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        match self.by_v2.get(&rtxn, v2)? {
            Some(id) => Ok(self.records.get(&rtxn, &id)?),
            None => Ok(None),
        }
    }

    pub fn find_by_aop_pid(&self, aop_pid: &str) -> Result<Vec<DocumentRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        let ids = self.idx_aop_pid.get(&rtxn, aop_pid)?.unwrap_or_default();
        self.fetch_all(&rtxn, &ids)
    }

    /// `findMatching(criteria)`: scalar equalities AND list-`OR` groups,
    /// ordered by `updated` descending, paginated (spec.md §4.3).
    pub fn find_matching(&self, criteria: &Criteria) -> Result<Vec<DocumentRecord>, StoreError> {
        let rtxn = self.env.read_txn()?;
        let mut acc: Option<RoaringBitmap> = None;

        for (field, value) in &criteria.equals {
            if value.is_empty() {
                continue;
            }
            let bitmap = self.scalar_bitmap(&rtxn, *field, value)?;
            acc = Some(intersect(acc, bitmap));
            if acc.as_ref().is_some_and(RoaringBitmap::is_empty) {
                return Ok(Vec::new());
            }
        }

        for (field, values) in &criteria.or_groups {
            let mut group = RoaringBitmap::new();
            for value in values {
                group |= self.list_bitmap(&rtxn, *field, value)?;
            }
            acc = Some(intersect(acc, group));
            if acc.as_ref().is_some_and(RoaringBitmap::is_empty) {
                return Ok(Vec::new());
            }
        }

        let ids = acc.unwrap_or_default();
        let mut records = self.fetch_all(&rtxn, &ids)?;
        records.sort_by(|a, b| b.updated.cmp(&a.updated));

        let per_page = criteria.pagination.per_page.max(1) as usize;
        let skip = (criteria.pagination.page.max(1) as usize - 1) * per_page;
        Ok(records.into_iter().skip(skip).take(per_page).collect())
    }

    /// Write `record`. When `expect_new` is set, the caller has resolved
    /// `NotFound` and is minting a brand-new `v3`: if another writer has
    /// claimed it in the meantime, fail with `NotUnique` so the pipeline can
    /// retry the allocation (spec.md §4.5 step 6).
    pub fn upsert(&self, record: &DocumentRecord, expect_new: bool) -> Result<DocumentRecord, StoreError> {
        let mut wtxn = self.env.write_txn()?;
        let existing_id = self.by_v3.get(&wtxn, &record.v3)?;

        if expect_new && existing_id.is_some() {
            return Err(StoreError::NotUnique(record.v3.clone()));
        }

        if let Some(id) = existing_id {
            if let Some(previous) = self.records.get(&wtxn, &id)? {
                self.unindex(&mut wtxn, id, &previous)?;
                if previous.v2 != record.v2 {
                    self.by_v2.delete(&mut wtxn, &previous.v2)?;
                }
            }
            self.records.put(&mut wtxn, &id, record)?;
            self.by_v2.put(&mut wtxn, &record.v2, &id)?;
            self.index(&mut wtxn, id, record)?;
        } else {
            let id = self.next_record_id(&wtxn)?;
            self.records.put(&mut wtxn, &id, record)?;
            self.by_v3.put(&mut wtxn, &record.v3, &id)?;
            self.by_v2.put(&mut wtxn, &record.v2, &id)?;
            self.index(&mut wtxn, id, record)?;
        }

        wtxn.commit()?;
        Ok(record.clone())
    }

    pub fn next_request_id(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn()?;
        let last = self.requests.remap_data_type::<DecodeIgnore>().last(&rtxn)?.map(|(id, _)| id + 1);
        Ok(last.unwrap_or_default() as u64)
    }

    pub fn log_request(&self, request: &Request) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn()?;
        self.requests.put(&mut wtxn, &(request.id as u32), request)?;
        wtxn.commit()?;
        Ok(())
    }

    pub fn update_request(&self, request: &Request) -> Result<(), StoreError> {
        self.log_request(request)
    }

    fn next_record_id(&self, rtxn: &RoTxn) -> Result<u32, StoreError> {
        Ok(self.records.remap_data_type::<DecodeIgnore>().last(rtxn)?.map(|(id, _)| id + 1).unwrap_or_default())
    }

    fn fetch_all(&self, rtxn: &RoTxn, ids: &RoaringBitmap) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut records = Vec::with_capacity(ids.len() as usize);
        for id in ids {
            if let Some(record) = self.records.get(rtxn, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn scalar_index(&self, field: ScalarField) -> Option<&Database<Str, RoaringBitmapCodec>> {
        match field {
            ScalarField::V2 => None,
            ScalarField::PubYear => Some(&self.idx_pub_year),
            ScalarField::Collab => Some(&self.idx_collab),
            ScalarField::Surnames => Some(&self.idx_surnames),
            ScalarField::Volume => Some(&self.idx_volume),
            ScalarField::Number => Some(&self.idx_number),
            ScalarField::Suppl => Some(&self.idx_suppl),
            ScalarField::ElocationId => Some(&self.idx_elocation_id),
            ScalarField::Fpage => Some(&self.idx_fpage),
            ScalarField::FpageSeq => Some(&self.idx_fpage_seq),
            ScalarField::Lpage => Some(&self.idx_lpage),
            ScalarField::PartialBody => Some(&self.idx_partial_body),
        }
    }

    fn list_index(&self, field: ListField) -> &Database<Str, RoaringBitmapCodec> {
        match field {
            ListField::IssnValue => &self.idx_issn_value,
            ListField::DoiValue => &self.idx_doi_value,
            ListField::ArticleTitleText => &self.idx_title_text,
        }
    }

    fn scalar_bitmap(&self, rtxn: &RoTxn, field: ScalarField, value: &str) -> Result<RoaringBitmap, StoreError> {
        if field == ScalarField::V2 {
            let mut bitmap = RoaringBitmap::new();
            if let Some(id) = self.by_v2.get(rtxn, value)? {
                bitmap.insert(id);
            }
            return Ok(bitmap);
        }
        let db = self.scalar_index(field).expect("non-v2 scalar fields are all indexed");
        Ok(db.get(rtxn, value)?.unwrap_or_default())
    }

    fn list_bitmap(&self, rtxn: &RoTxn, field: ListField, value: &str) -> Result<RoaringBitmap, StoreError> {
        Ok(self.list_index(field).get(rtxn, value)?.unwrap_or_default())
    }

    fn index(&self, wtxn: &mut RwTxn, id: u32, record: &DocumentRecord) -> Result<(), StoreError> {
        self.touch(wtxn, &self.idx_aop_pid, &record.aop_pid, id, true)?;
        self.touch(wtxn, &self.idx_pub_year, &record.pub_year, id, true)?;
        self.touch(wtxn, &self.idx_collab, &record.collab, id, true)?;
        self.touch(wtxn, &self.idx_surnames, &record.surnames, id, true)?;
        self.touch(wtxn, &self.idx_volume, &record.volume, id, true)?;
        self.touch(wtxn, &self.idx_number, &record.number, id, true)?;
        self.touch(wtxn, &self.idx_suppl, &record.suppl, id, true)?;
        self.touch(wtxn, &self.idx_elocation_id, &record.elocation_id, id, true)?;
        self.touch(wtxn, &self.idx_fpage, &record.fpage, id, true)?;
        self.touch(wtxn, &self.idx_fpage_seq, &record.fpage_seq, id, true)?;
        self.touch(wtxn, &self.idx_lpage, &record.lpage, id, true)?;
        self.touch(wtxn, &self.idx_partial_body, &record.partial_body, id, true)?;
        for issn in &record.issns {
            self.touch(wtxn, &self.idx_issn_value, &issn.value, id, true)?;
        }
        for doi in &record.doi_with_lang {
            self.touch(wtxn, &self.idx_doi_value, &doi.value, id, true)?;
        }
        for title in &record.article_titles {
            self.touch(wtxn, &self.idx_title_text, &title.text, id, true)?;
        }
        Ok(())
    }

    fn unindex(&self, wtxn: &mut RwTxn, id: u32, record: &DocumentRecord) -> Result<(), StoreError> {
        self.touch(wtxn, &self.idx_aop_pid, &record.aop_pid, id, false)?;
        self.touch(wtxn, &self.idx_pub_year, &record.pub_year, id, false)?;
        self.touch(wtxn, &self.idx_collab, &record.collab, id, false)?;
        self.touch(wtxn, &self.idx_surnames, &record.surnames, id, false)?;
        self.touch(wtxn, &self.idx_volume, &record.volume, id, false)?;
        self.touch(wtxn, &self.idx_number, &record.number, id, false)?;
        self.touch(wtxn, &self.idx_suppl, &record.suppl, id, false)?;
        self.touch(wtxn, &self.idx_elocation_id, &record.elocation_id, id, false)?;
        self.touch(wtxn, &self.idx_fpage, &record.fpage, id, false)?;
        self.touch(wtxn, &self.idx_fpage_seq, &record.fpage_seq, id, false)?;
        self.touch(wtxn, &self.idx_lpage, &record.lpage, id, false)?;
        self.touch(wtxn, &self.idx_partial_body, &record.partial_body, id, false)?;
        for issn in &record.issns {
            self.touch(wtxn, &self.idx_issn_value, &issn.value, id, false)?;
        }
        for doi in &record.doi_with_lang {
            self.touch(wtxn, &self.idx_doi_value, &doi.value, id, false)?;
        }
        for title in &record.article_titles {
            self.touch(wtxn, &self.idx_title_text, &title.text, id, false)?;
        }
        Ok(())
    }

    fn touch(
        &self,
        wtxn: &mut RwTxn,
        db: &Database<Str, RoaringBitmapCodec>,
        value: &str,
        id: u32,
        add: bool,
    ) -> Result<(), StoreError> {
        if value.is_empty() {
            return Ok(());
        }
        let mut bitmap = db.get(wtxn, value)?.unwrap_or_default();
        if add {
            bitmap.insert(id);
        } else {
            bitmap.remove(id);
        }
        if bitmap.is_empty() {
            db.delete(wtxn, value)?;
        } else {
            db.put(wtxn, value, &bitmap)?;
        }
        Ok(())
    }
}

fn intersect(acc: Option<RoaringBitmap>, next: RoaringBitmap) -> RoaringBitmap {
    match acc {
        Some(acc) => acc & next,
        None => next,
    }
}
