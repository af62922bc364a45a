use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Status of an audit `Request` row, spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

/// Append-only audit row logged by the Request Pipeline (spec.md §4.5
/// steps 1 and 7). Grounded on `scielo_core.id_provider.controller`'s
/// `_log_new_request`/`_log_request_update` and an implicit `Requests`
/// model referenced there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub user: String,
    pub in_v2: String,
    pub in_v3: String,
    pub in_aop_pid: String,
    pub out_v2: String,
    pub out_v3: String,
    pub out_aop_pid: String,
    pub status: RequestStatus,
    pub diffs: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
}

impl Request {
    /// A freshly logged request, before the Resolver/Allocator have run.
    pub fn new_pending(id: u64, user: String, in_v2: String, in_v3: String, in_aop_pid: String, now: OffsetDateTime) -> Self {
        Request {
            id,
            user,
            in_v2,
            in_v3,
            in_aop_pid,
            out_v2: String::new(),
            out_v3: String::new(),
            out_aop_pid: String::new(),
            status: RequestStatus::Pending,
            diffs: Vec::new(),
            created: now,
            updated: now,
        }
    }

    /// Record the pipeline's output identifiers and mark the request
    /// completed, computing a human-readable diff list the way
    /// `_log_request_update` is implied to via `request.update_diffs()`.
    pub fn complete(&mut self, out_v2: String, out_v3: String, out_aop_pid: String, now: OffsetDateTime) {
        self.diffs = diff_identifiers(&self.in_v2, &out_v2, &self.in_v3, &out_v3, &self.in_aop_pid, &out_aop_pid);
        self.out_v2 = out_v2;
        self.out_v3 = out_v3;
        self.out_aop_pid = out_aop_pid;
        self.status = RequestStatus::Completed;
        self.updated = now;
    }

    pub fn fail(&mut self, now: OffsetDateTime) {
        self.status = RequestStatus::Failed;
        self.updated = now;
    }
}

fn diff_identifiers(in_v2: &str, out_v2: &str, in_v3: &str, out_v3: &str, in_aop: &str, out_aop: &str) -> Vec<String> {
    let mut diffs = Vec::new();
    if in_v2 != out_v2 {
        diffs.push(format!("v2: {in_v2:?} -> {out_v2:?}"));
    }
    if in_v3 != out_v3 {
        diffs.push(format!("v3: {in_v3:?} -> {out_v3:?}"));
    }
    if in_aop != out_aop {
        diffs.push(format!("aop_pid: {in_aop:?} -> {out_aop:?}"));
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_records_diffs_only_for_changed_identifiers() {
        let now = OffsetDateTime::now_utc();
        let mut req = Request::new_pending(1, "tester".into(), String::new(), String::new(), String::new(), now);
        req.complete("V2".into(), "V3".into(), String::new(), now);
        assert_eq!(req.status, RequestStatus::Completed);
        assert_eq!(req.diffs.len(), 2);
    }
}
