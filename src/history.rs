//! Local history of completed try-ons.
//!
//! Purely client-side: nothing here talks to the backend, so separate
//! clients keep separate histories. Ids are timestamp-based and kept
//! strictly increasing so entries created in the same millisecond
//! cannot collide.

use std::sync::Mutex;

use chrono::Utc;

use crate::models::HistoryEntry;

/// Newest-first log of completed try-ons
pub struct HistoryLog {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: Vec<HistoryEntry>,
    last_id: i64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::from_entries(Vec::new())
    }

    /// Rebuilds the log from previously persisted entries (newest first).
    /// Id allocation continues above the highest restored id.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let last_id = entries.iter().map(|e| e.id).max().unwrap_or(0);
        Self {
            inner: Mutex::new(Inner { entries, last_id }),
        }
    }

    /// Builds an entry for a completed try-on and prepends it
    pub fn record(
        &self,
        person_preview: &str,
        garment_preview: &str,
        result_filename: &str,
        result_url: &str,
    ) -> HistoryEntry {
        let mut inner = self.inner.lock().unwrap();
        let id = Utc::now().timestamp_millis().max(inner.last_id + 1);
        inner.last_id = id;

        let entry = HistoryEntry {
            id,
            person_preview: person_preview.to_string(),
            garment_preview: garment_preview.to_string(),
            result_filename: result_filename.to_string(),
            result_url: result_url.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        inner.entries.insert(0, entry.clone());
        entry
    }

    /// Removes the entry with the given id. Returns whether anything
    /// was removed; a second call with the same id is a no-op.
    pub fn remove(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.id != id);
        inner.entries.len() != before
    }

    /// Snapshot of the log, newest first
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner.lock().unwrap().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_prepended_newest_first() {
        let log = HistoryLog::new();
        log.record("p1", "g1", "a.png", "http://r/a.png");
        log.record("p2", "g2", "b.png", "http://r/b.png");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].result_filename, "b.png");
        assert_eq!(entries[1].result_filename, "a.png");
    }

    #[test]
    fn ids_are_strictly_increasing_within_a_run() {
        let log = HistoryLog::new();
        let first = log.record("p", "g", "a.png", "u");
        let second = log.record("p", "g", "b.png", "u");
        assert!(second.id > first.id);
    }

    #[test]
    fn remove_is_idempotent() {
        let log = HistoryLog::new();
        let entry = log.record("p", "g", "a.png", "u");

        assert!(log.remove(entry.id));
        assert!(!log.remove(entry.id));
        assert!(log.is_empty());
    }

    #[test]
    fn removing_an_unknown_id_changes_nothing() {
        let log = HistoryLog::new();
        log.record("p", "g", "a.png", "u");
        assert!(!log.remove(424242));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn restored_entries_keep_their_order_and_id_floor() {
        let restored = vec![
            HistoryEntry {
                id: 900,
                person_preview: "p".to_string(),
                garment_preview: "g".to_string(),
                result_filename: "old.png".to_string(),
                result_url: "u".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        ];
        let log = HistoryLog::from_entries(restored);
        let entry = log.record("p", "g", "new.png", "u");

        assert!(entry.id > 900);
        assert_eq!(log.entries()[0].result_filename, "new.png");
        assert_eq!(log.entries()[1].result_filename, "old.png");
    }
}
