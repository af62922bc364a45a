use std::path::Path;

use heed::types::{DecodeIgnore, SerdeJson, Str};
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use idp_types::{Migration, MigrationStatus};

use crate::codec::{RoaringBitmapCodec, BEU32};
use crate::error::Error;

const NUMBER_OF_DATABASES: u32 = 4;

mod db_name {
    pub const ROWS: &str = "rows";
    pub const BY_V2: &str = "by-v2";
    pub const IDX_ISSN_AOP: &str = "idx-issn-aop";
    pub const IDX_STATUS: &str = "idx-status";
}

/// `heed`-backed tracking store for `Migration` rows, a separate `Env` from
/// the Document Store (spec.md §5's "two connection aliases"), grounded on
/// `index-scheduler::queue::tasks::TaskQueue`'s layout like `idp_store::
/// DocumentStore` is.
pub struct MigrationStore {
    env: Env,
    rows: Database<BEU32, SerdeJson<Migration>>,
    by_v2: Database<Str, BEU32>,
    idx_issn_aop: Database<Str, RoaringBitmapCodec>,
    idx_status: Database<Str, RoaringBitmapCodec>,
}

impl MigrationStore {
    pub fn open(path: &Path, map_size: usize) -> Result<Self, Error> {
        std::fs::create_dir_all(path).map_err(heed::Error::Io)?;
        let env = unsafe { EnvOpenOptions::new().max_dbs(NUMBER_OF_DATABASES).map_size(map_size).open(path) }?;

        let env_for_txn = env.clone();
        let mut wtxn = env_for_txn.write_txn()?;
        let store = MigrationStore {
            rows: env.create_database(&mut wtxn, Some(db_name::ROWS))?,
            by_v2: env.create_database(&mut wtxn, Some(db_name::BY_V2))?,
            idx_issn_aop: env.create_database(&mut wtxn, Some(db_name::IDX_ISSN_AOP))?,
            idx_status: env.create_database(&mut wtxn, Some(db_name::IDX_STATUS))?,
            env,
        };
        wtxn.commit()?;
        Ok(store)
    }

    pub fn find_by_v2(&self, v2: &str) -> Result<Option<Migration>, Error> {
        let rtxn = self.env.read_txn()?;
        match self.by_v2.get(&rtxn, v2)? {
            Some(id) => Ok(self.rows.get(&rtxn, &id)?),
            None => Ok(None),
        }
    }

    /// Seed or overwrite a row keyed by `v2`, matching
    /// `migration.controller.save_migration`'s skip/overwrite split.
    pub fn upsert(&self, migration: &Migration) -> Result<(), Error> {
        let mut wtxn = self.env.write_txn()?;
        let existing_id = self.by_v2.get(&wtxn, &migration.v2)?;

        let id = match existing_id {
            Some(id) => {
                if let Some(previous) = self.rows.get(&wtxn, &id)? {
                    self.unindex(&mut wtxn, id, &previous)?;
                }
                id
            }
            None => self.next_id(&wtxn)?,
        };

        self.rows.put(&mut wtxn, &id, migration)?;
        self.by_v2.put(&mut wtxn, &migration.v2, &id)?;
        self.index(&mut wtxn, id, migration)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Enumerate `v2`s for one journal/AOP-form/status combination, in
    /// insertion order (spec.md §4.6 "paginated by insertion order").
    pub fn pids_for(&self, issn: &str, is_aop: bool, status: MigrationStatus) -> Result<Vec<String>, Error> {
        let rtxn = self.env.read_txn()?;
        let issn_bitmap = self.idx_issn_aop.get(&rtxn, &issn_aop_key(issn, is_aop))?.unwrap_or_default();
        let status_bitmap = self.idx_status.get(&rtxn, status_key(status))?.unwrap_or_default();
        let mut ids: Vec<u32> = (issn_bitmap & status_bitmap).iter().collect();
        ids.sort_unstable();

        let mut pids = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.rows.get(&rtxn, &id)? {
                pids.push(row.v2);
            }
        }
        Ok(pids)
    }

    fn next_id(&self, rtxn: &heed::RoTxn) -> Result<u32, Error> {
        Ok(self.rows.remap_data_type::<DecodeIgnore>().last(rtxn)?.map(|(id, _)| id + 1).unwrap_or_default())
    }

    fn index(&self, wtxn: &mut RwTxn, id: u32, migration: &Migration) -> Result<(), Error> {
        touch(wtxn, &self.idx_issn_aop, &issn_aop_key(&migration.issn, migration.is_aop), id, true)?;
        touch(wtxn, &self.idx_status, status_key(migration.status), id, true)?;
        Ok(())
    }

    fn unindex(&self, wtxn: &mut RwTxn, id: u32, migration: &Migration) -> Result<(), Error> {
        touch(wtxn, &self.idx_issn_aop, &issn_aop_key(&migration.issn, migration.is_aop), id, false)?;
        touch(wtxn, &self.idx_status, status_key(migration.status), id, false)?;
        Ok(())
    }
}

fn issn_aop_key(issn: &str, is_aop: bool) -> String {
    format!("{issn}\u{0}{is_aop}")
}

fn status_key(status: MigrationStatus) -> &'static str {
    match status {
        MigrationStatus::Created => "created",
        MigrationStatus::Xml => "xml",
        MigrationStatus::Migrated => "migrated",
        MigrationStatus::Failed => "failed",
    }
}

fn touch(wtxn: &mut RwTxn, db: &Database<Str, RoaringBitmapCodec>, key: &str, id: u32, add: bool) -> Result<(), Error> {
    let mut bitmap = db.get(wtxn, key)?.unwrap_or_default();
    if add {
        bitmap.insert(id);
    } else {
        bitmap.remove(id);
    }
    if bitmap.is_empty() {
        db.delete(wtxn, key)?;
    } else {
        db.put(wtxn, key, &bitmap)?;
    }
    Ok(())
}
