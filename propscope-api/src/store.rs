//! In-memory result store
//!
//! Holds the latest [`NormalizedResult`] per `super_id` and per
//! `property_url`, plus a bounded most-recent-first history for the
//! dashboard sidebar. Records are never deleted from the maps; only the
//! history evicts past its capacity.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use propscope_common::{AnalysisStatus, NormalizedResult};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Result of a [`ResultStore::store_result`] call
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// No record for this entity existed
    Inserted(NormalizedResult),
    /// Merged onto an existing record; carries the stored result
    Merged(NormalizedResult),
    /// The existing record is terminal and cannot move to the incoming status
    Rejected {
        current: AnalysisStatus,
        attempted: AnalysisStatus,
    },
}

impl StoreOutcome {
    /// The record now held by the store, if the write was accepted
    pub fn stored(&self) -> Option<&NormalizedResult> {
        match self {
            StoreOutcome::Inserted(r) | StoreOutcome::Merged(r) => Some(r),
            StoreOutcome::Rejected { .. } => None,
        }
    }
}

struct StoreInner {
    by_super_id: HashMap<String, NormalizedResult>,
    by_property_url: HashMap<String, NormalizedResult>,
    history: VecDeque<NormalizedResult>,
    capacity: usize,
}

/// Shared handle to the result store
#[derive(Clone)]
pub struct ResultStore {
    inner: Arc<RwLock<StoreInner>>,
}

/// Two records describe the same analysis when their ids agree, or, when
/// either lacks an id, when their property URLs agree.
fn same_entity(a: &NormalizedResult, b: &NormalizedResult) -> bool {
    match (&a.key.super_id, &b.key.super_id) {
        (Some(x), Some(y)) => x == y,
        _ => match (&a.key.property_url, &b.key.property_url) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

impl ResultStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                by_super_id: HashMap::new(),
                by_property_url: HashMap::new(),
                history: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Upsert a record by `super_id`, else by `property_url`.
    ///
    /// A `complete` record without floorplan CSV is stored as `error`.
    pub async fn store_result(&self, mut incoming: NormalizedResult) -> StoreOutcome {
        if incoming.analysis_status == AnalysisStatus::Complete {
            if let Err(reason) = incoming.check_complete() {
                warn!(
                    "Downgrading complete record {:?} to error: {}",
                    incoming.key.super_id, reason
                );
                incoming.analysis_status = AnalysisStatus::Error;
            }
        }

        let mut inner = self.inner.write().await;

        let existing = inner.find(&incoming).cloned();
        let (record, outcome_is_merge) = match existing.as_ref() {
            Some(existing) => {
                if !existing.analysis_status.can_transition_to(incoming.analysis_status) {
                    warn!(
                        "Rejected {} -> {} for super_id={:?} property_url={:?}",
                        existing.analysis_status,
                        incoming.analysis_status,
                        existing.key.super_id,
                        existing.key.property_url
                    );
                    return StoreOutcome::Rejected {
                        current: existing.analysis_status,
                        attempted: incoming.analysis_status,
                    };
                }
                (incoming.merged_onto(existing), true)
            }
            None => (incoming, false),
        };

        if let Some(id) = &record.key.super_id {
            inner.by_super_id.insert(id.clone(), record.clone());
        }
        if let Some(url) = &record.key.property_url {
            inner.by_property_url.insert(url.clone(), record.clone());
        }
        // Keep an entry under a previous URL pointing at the current record
        if let Some(old_url) = existing.as_ref().and_then(|e| e.key.property_url.as_ref()) {
            if record.key.property_url.as_ref() != Some(old_url) {
                let stale = inner
                    .by_property_url
                    .get(old_url)
                    .is_some_and(|r| same_entity(r, &record));
                if stale {
                    inner.by_property_url.insert(old_url.clone(), record.clone());
                }
            }
        }

        inner.record_history(record.clone());

        debug!(
            "Stored {} record super_id={:?} property_url={:?}",
            record.analysis_status, record.key.super_id, record.key.property_url
        );

        if outcome_is_merge {
            StoreOutcome::Merged(record)
        } else {
            StoreOutcome::Inserted(record)
        }
    }

    pub async fn get_result_by_super_id(&self, super_id: &str) -> Option<NormalizedResult> {
        self.inner.read().await.by_super_id.get(super_id).cloned()
    }

    pub async fn get_result_by_property_url(&self, property_url: &str) -> Option<NormalizedResult> {
        self.inner.read().await.by_property_url.get(property_url).cloned()
    }

    /// History, most recent first
    pub async fn get_all_results_chrono(&self) -> Vec<NormalizedResult> {
        self.inner.read().await.history.iter().cloned().collect()
    }

    /// Number of history entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl StoreInner {
    fn find(&self, incoming: &NormalizedResult) -> Option<&NormalizedResult> {
        if let Some(found) = incoming
            .key
            .super_id
            .as_ref()
            .and_then(|id| self.by_super_id.get(id))
        {
            return Some(found);
        }
        incoming
            .key
            .property_url
            .as_ref()
            .and_then(|url| self.by_property_url.get(url))
            .filter(|existing| same_entity(existing, incoming))
    }

    fn record_history(&mut self, record: NormalizedResult) {
        match self.history.iter().position(|e| same_entity(e, &record)) {
            Some(index) => self.history[index] = record,
            None => {
                self.history.push_front(record);
                while self.history.len() > self.capacity {
                    if let Some(evicted) = self.history.pop_back() {
                        debug!("History full, evicted super_id={:?}", evicted.key.super_id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn record(super_id: Option<&str>, url: Option<&str>, status: AnalysisStatus) -> NormalizedResult {
        NormalizedResult::placeholder(
            super_id.map(String::from),
            url.map(String::from),
            status,
            at(0),
        )
    }

    fn complete(super_id: &str, url: Option<&str>) -> NormalizedResult {
        let mut r = record(Some(super_id), url, AnalysisStatus::Complete);
        r.floorplan.inline_csv = Some("Room,Area\nKitchen,10".into());
        r
    }

    #[tokio::test]
    async fn test_started_then_complete_is_one_record() {
        let store = ResultStore::new(50);
        let url = "https://example.com/p/1";

        let first = store
            .store_result(record(Some("abc"), Some(url), AnalysisStatus::Started))
            .await;
        assert!(matches!(first, StoreOutcome::Inserted(_)));

        let second = store.store_result(complete("abc", None)).await;
        assert!(matches!(second, StoreOutcome::Merged(_)));

        assert_eq!(store.len().await, 1);
        let stored = store.get_result_by_super_id("abc").await.unwrap();
        assert_eq!(stored.analysis_status, AnalysisStatus::Complete);
        assert_eq!(stored.key.property_url.as_deref(), Some(url));
        assert_eq!(
            store.get_result_by_property_url(url).await.unwrap().analysis_status,
            AnalysisStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_complete_without_csv_is_stored_as_error() {
        let store = ResultStore::new(50);
        let outcome = store
            .store_result(record(Some("abc"), None, AnalysisStatus::Complete))
            .await;

        assert_eq!(outcome.stored().unwrap().analysis_status, AnalysisStatus::Error);
        let stored = store.get_result_by_super_id("abc").await.unwrap();
        assert_eq!(stored.analysis_status, AnalysisStatus::Error);
    }

    #[tokio::test]
    async fn test_terminal_records_reject_other_statuses() {
        let store = ResultStore::new(50);
        store.store_result(complete("abc", Some("https://example.com/p/1"))).await;

        let outcome = store
            .store_result(record(Some("abc"), None, AnalysisStatus::Error))
            .await;
        assert_eq!(
            outcome,
            StoreOutcome::Rejected {
                current: AnalysisStatus::Complete,
                attempted: AnalysisStatus::Error,
            }
        );

        // Redelivery of complete is still merged
        let again = store.store_result(complete("abc", None)).await;
        assert!(matches!(again, StoreOutcome::Merged(_)));
        assert_eq!(
            store.get_result_by_super_id("abc").await.unwrap().analysis_status,
            AnalysisStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_missing_lookups_are_none() {
        let store = ResultStore::new(50);
        assert!(store.get_result_by_super_id("nope").await.is_none());
        assert!(store.get_result_by_property_url("https://nope").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_history_capped_and_most_recent_first() {
        let store = ResultStore::new(50);
        for i in 0..51 {
            let mut r = record(
                Some(&format!("id-{i}")),
                Some(&format!("https://example.com/p/{i}")),
                AnalysisStatus::Started,
            );
            r.key.received_at = at(i);
            store.store_result(r).await;
        }

        let history = store.get_all_results_chrono().await;
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].key.super_id.as_deref(), Some("id-50"));
        assert_eq!(history[49].key.super_id.as_deref(), Some("id-1"));
        // Evicted from history but still addressable
        assert!(store.get_result_by_super_id("id-0").await.is_some());
    }

    #[tokio::test]
    async fn test_update_keeps_history_slot() {
        let store = ResultStore::new(50);
        store
            .store_result(record(Some("a"), Some("https://example.com/a"), AnalysisStatus::Started))
            .await;
        store
            .store_result(record(Some("b"), Some("https://example.com/b"), AnalysisStatus::Started))
            .await;
        store.store_result(complete("a", None)).await;

        let history = store.get_all_results_chrono().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key.super_id.as_deref(), Some("b"));
        assert_eq!(history[1].key.super_id.as_deref(), Some("a"));
        assert_eq!(history[1].analysis_status, AnalysisStatus::Complete);
    }

    #[tokio::test]
    async fn test_url_only_record_is_claimed_by_id() {
        let store = ResultStore::new(50);
        let url = "https://example.com/p/7";
        store.store_result(record(None, Some(url), AnalysisStatus::Started)).await;

        let outcome = store.store_result(complete("xyz", Some(url))).await;
        assert!(matches!(outcome, StoreOutcome::Merged(_)));
        assert_eq!(store.len().await, 1);
        assert!(store.get_result_by_super_id("xyz").await.is_some());
    }

    #[tokio::test]
    async fn test_different_ids_on_same_url_are_distinct() {
        let store = ResultStore::new(50);
        let url = "https://example.com/p/1";
        store.store_result(complete("run-1", Some(url))).await;
        let outcome = store
            .store_result(record(Some("run-2"), Some(url), AnalysisStatus::Started))
            .await;

        assert!(matches!(outcome, StoreOutcome::Inserted(_)));
        assert_eq!(store.len().await, 2);
        // URL lookup follows the most recent run
        assert_eq!(
            store.get_result_by_property_url(url).await.unwrap().key.super_id.as_deref(),
            Some("run-2")
        );
    }
}
