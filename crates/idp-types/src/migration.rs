use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// State machine for one `Migration` row, spec.md §4.6.
///
/// `CREATED -> XML -> MIGRATED`, `-> FAILED` from any non-terminal state,
/// `MIGRATED -> XML` via UndoIdRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Created,
    Xml,
    Migrated,
    Failed,
}

impl MigrationStatus {
    /// Whether `self -> next` is a legal state machine transition.
    pub fn can_transition_to(self, next: MigrationStatus) -> bool {
        use MigrationStatus::*;
        match (self, next) {
            (Created, Xml) => true,
            (Xml, Migrated) => true,
            (Migrated, Xml) => true,
            (_, Failed) => !matches!(self, Failed),
            _ => false,
        }
    }
}

/// Which of the three pull sources (spec.md §4.6) produced the XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullSource {
    Website,
    Filesystem,
    ArticleMeta,
}

/// One row tracked by the Migration Orchestrator, identified by `v2`.
///
/// Grounded on `scielo_core.migration.models.Migration`, consolidated on
/// its newest revision: a distinct store from the id-provider database, XML
/// kept as a string field rather than a GridFS file (spec.md §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub id: u64,
    pub v2: String,
    pub aop_pid: String,
    pub is_aop: bool,
    pub file_path: String,
    pub issn: String,
    pub year: String,
    pub order: String,
    pub v91: String,
    pub v93: String,
    pub v3: String,
    pub xml: String,
    pub source: Option<PullSource>,
    pub status: MigrationStatus,
    pub status_msg: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
}

impl Migration {
    pub fn seed(
        id: u64,
        v2: String,
        aop_pid: String,
        is_aop: bool,
        file_path: String,
        issn: String,
        year: String,
        order: String,
        v91: String,
        v93: String,
        now: OffsetDateTime,
    ) -> Migration {
        Migration {
            id,
            v2,
            aop_pid,
            is_aop,
            file_path,
            issn,
            year,
            order,
            v91,
            v93,
            v3: String::new(),
            xml: String::new(),
            source: None,
            status: MigrationStatus::Created,
            status_msg: String::new(),
            created: now,
            updated: now,
        }
    }

    /// Overwrite descriptor fields from a fresh seed, keeping identity
    /// (`id`, `v2`) and resetting `status` to `CREATED`, matching
    /// `migration.controller.save_migration`'s non-`skip_update` path.
    pub fn re_seed(
        &mut self,
        aop_pid: String,
        is_aop: bool,
        file_path: String,
        issn: String,
        year: String,
        order: String,
        v91: String,
        v93: String,
        now: OffsetDateTime,
    ) {
        self.aop_pid = aop_pid;
        self.is_aop = is_aop;
        self.file_path = file_path;
        self.issn = issn;
        self.year = year;
        self.order = order;
        self.v91 = v91;
        self.v93 = v93;
        self.status = MigrationStatus::Created;
        self.status_msg.clear();
        self.updated = now;
    }

    pub fn transition(&mut self, next: MigrationStatus, msg: String, now: OffsetDateTime) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError { from: self.status, to: next });
        }
        self.status = next;
        self.status_msg = msg;
        self.updated = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal migration transition from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: MigrationStatus,
    pub to: MigrationStatus,
}
