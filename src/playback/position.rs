//! Resume positions
//!
//! Persists the last playback offset per video identity. Offsets of five
//! seconds or less are never written, and entries older than thirty days are
//! purged the next time they are read. Storage failures are logged and
//! swallowed: a broken store costs the user their resume point, not playback.
//!
//! [`PositionWriter`] moves saves onto the blocking pool so a slow disk never
//! stalls a session loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{normalize_identity, PlaybackPosition};
use crate::store::KeyValueStore;

/// Offsets at or below this are not worth resuming
pub const MIN_RESUME_SECONDS: f64 = 5.0;

/// Entries older than this are stale
pub const MAX_AGE_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Namespace prefix for position keys
pub const KEY_PREFIX: &str = "shelfplay.position:";

/// Per-identity resume offsets on top of a key-value store
#[derive(Clone)]
pub struct PositionStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionStore").finish_non_exhaustive()
    }
}

impl PositionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Storage key for an identity
    pub fn key(identity: &str) -> String {
        format!(
            "{}{}",
            KEY_PREFIX,
            urlencoding::encode(&normalize_identity(identity))
        )
    }

    /// Record an offset now. Returns whether anything was written.
    pub fn save(&self, identity: &str, offset_seconds: f64) -> bool {
        self.save_at(identity, offset_seconds, now_ms())
    }

    pub fn save_at(&self, identity: &str, offset_seconds: f64, now_ms: i64) -> bool {
        if !offset_seconds.is_finite() || offset_seconds <= MIN_RESUME_SECONDS {
            return false;
        }

        let position = PlaybackPosition {
            video_identity: normalize_identity(identity),
            offset_seconds,
            saved_at_epoch_ms: now_ms,
        };
        let body = match serde_json::to_string(&position) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(identity, error = %e, "failed to encode playback position");
                return false;
            }
        };

        match self.store.set(&Self::key(identity), &body) {
            Ok(()) => {
                tracing::trace!(identity, offset_seconds, "saved playback position");
                true
            }
            Err(e) => {
                tracing::warn!(identity, error = %e, "failed to save playback position");
                false
            }
        }
    }

    /// Resume offset for an identity, if one exists and is fresh
    pub fn load(&self, identity: &str) -> Option<f64> {
        self.load_at(identity, now_ms())
    }

    pub fn load_at(&self, identity: &str, now_ms: i64) -> Option<f64> {
        self.get_at(identity, now_ms).map(|p| p.offset_seconds)
    }

    /// Full stored record for an identity, if one exists and is fresh
    pub fn get(&self, identity: &str) -> Option<PlaybackPosition> {
        self.get_at(identity, now_ms())
    }

    pub fn get_at(&self, identity: &str, now_ms: i64) -> Option<PlaybackPosition> {
        self.read_valid(&Self::key(identity), now_ms)
    }

    /// Remove one identity's entry. Returns whether the removal succeeded.
    pub fn forget(&self, identity: &str) -> bool {
        match self.store.remove(&Self::key(identity)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(identity, error = %e, "failed to remove playback position");
                false
            }
        }
    }

    /// All valid positions, most recent first. Stale entries are purged on the way.
    pub fn list(&self) -> Vec<PlaybackPosition> {
        self.list_at(now_ms())
    }

    pub fn list_at(&self, now_ms: i64) -> Vec<PlaybackPosition> {
        let mut positions: Vec<PlaybackPosition> = self
            .keys()
            .iter()
            .filter_map(|key| self.read_valid(key, now_ms))
            .collect();
        positions.sort_by(|a, b| b.saved_at_epoch_ms.cmp(&a.saved_at_epoch_ms));
        positions
    }

    /// Drop every stale or malformed entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(now_ms())
    }

    pub fn purge_expired_at(&self, now_ms: i64) -> usize {
        let keys = self.keys();
        let total = keys.len();
        let kept = keys
            .iter()
            .filter(|key| self.read_valid(key, now_ms).is_some())
            .count();
        total - kept
    }

    fn keys(&self) -> Vec<String> {
        self.store.keys_with_prefix(KEY_PREFIX).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to list playback positions");
            Vec::new()
        })
    }

    /// Read one entry, removing it if it is malformed or expired
    fn read_valid(&self, key: &str, now_ms: i64) -> Option<PlaybackPosition> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read playback position");
                return None;
            }
        };

        let position = match serde_json::from_str::<PlaybackPosition>(&raw) {
            Ok(p) if p.offset_seconds.is_finite() => p,
            _ => {
                tracing::debug!(key, "discarding malformed playback position");
                self.remove_quietly(key);
                return None;
            }
        };

        if now_ms - position.saved_at_epoch_ms > MAX_AGE_MS {
            tracing::debug!(key, "discarding expired playback position");
            self.remove_quietly(key);
            return None;
        }

        Some(position)
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "failed to remove playback position");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A queued save: identity, offset and the time it was observed
type PendingSave = (String, f64, i64);

/// Background saver for one session.
///
/// Saves run on the blocking pool one at a time, in the order they were
/// queued, stamped with the time they were queued.
#[derive(Debug)]
pub struct PositionWriter {
    tx: mpsc::UnboundedSender<PendingSave>,
    task: JoinHandle<()>,
}

impl PositionWriter {
    /// Start the writer on the current tokio runtime
    pub fn spawn(positions: PositionStore) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingSave>();
        let task = tokio::spawn(async move {
            while let Some((identity, offset_seconds, saved_at)) = rx.recv().await {
                let positions = positions.clone();
                let write = tokio::task::spawn_blocking(move || {
                    positions.save_at(&identity, offset_seconds, saved_at)
                });
                if let Err(e) = write.await {
                    tracing::warn!(error = %e, "playback position write panicked");
                }
            }
        });
        Self { tx, task }
    }

    /// Queue a save. Returns false if the writer has already stopped.
    pub fn queue(&self, identity: &str, offset_seconds: f64) -> bool {
        self.tx
            .send((identity.to_string(), offset_seconds, now_ms()))
            .is_ok()
    }

    /// Stop accepting saves and wait for the queued ones to land
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "playback position writer ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const NOW: i64 = 1_760_000_000_000;

    fn store() -> (Arc<MemoryStore>, PositionStore) {
        let backend = Arc::new(MemoryStore::new());
        let positions = PositionStore::new(backend.clone());
        (backend, positions)
    }

    /// Backend whose every call fails
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
        fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn test_save_and_load() {
        let (_, positions) = store();
        assert!(positions.save_at("/m/a.mkv", 42.3, NOW));
        assert_eq!(positions.load_at("/m/a.mkv", NOW + DAY_MS), Some(42.3));
    }

    #[test]
    fn test_short_offsets_are_not_saved() {
        let (backend, positions) = store();
        for offset in [0.0, 1.5, 5.0, -3.0, f64::NAN] {
            assert!(!positions.save_at("/m/a.mkv", offset, NOW));
        }
        assert!(backend.keys_with_prefix(KEY_PREFIX).unwrap().is_empty());
    }

    #[test]
    fn test_short_offset_leaves_previous_entry() {
        let (_, positions) = store();
        positions.save_at("/m/a.mkv", 300.0, NOW);
        positions.save_at("/m/a.mkv", 3.0, NOW + 1);
        assert_eq!(positions.load_at("/m/a.mkv", NOW + 2), Some(300.0));
    }

    #[test]
    fn test_save_overwrites() {
        let (_, positions) = store();
        positions.save_at("/m/a.mkv", 100.0, NOW);
        positions.save_at("/m/a.mkv", 200.0, NOW + 1000);
        assert_eq!(positions.load_at("/m/a.mkv", NOW + 2000), Some(200.0));
    }

    #[test]
    fn test_expired_entry_is_purged_and_idempotent() {
        let (backend, positions) = store();
        positions.save_at("/m/a.mkv", 100.0, NOW);

        let later = NOW + 30 * DAY_MS + 1;
        assert_eq!(positions.load_at("/m/a.mkv", later), None);
        assert_eq!(backend.get(&PositionStore::key("/m/a.mkv")).unwrap(), None);
        assert_eq!(positions.load_at("/m/a.mkv", later), None);
    }

    #[test]
    fn test_exactly_thirty_days_is_still_valid() {
        let (_, positions) = store();
        positions.save_at("/m/a.mkv", 100.0, NOW);
        assert_eq!(positions.load_at("/m/a.mkv", NOW + 30 * DAY_MS), Some(100.0));
    }

    #[test]
    fn test_malformed_record_is_removed() {
        let (backend, positions) = store();
        let key = PositionStore::key("/m/a.mkv");
        backend.set(&key, "{\"offset\":").unwrap();
        assert_eq!(positions.load_at("/m/a.mkv", NOW), None);
        assert_eq!(backend.get(&key).unwrap(), None);
    }

    #[test]
    fn test_broken_backend_never_fails_outward() {
        let positions = PositionStore::new(Arc::new(BrokenStore));
        assert!(!positions.save_at("/m/a.mkv", 100.0, NOW));
        assert_eq!(positions.load_at("/m/a.mkv", NOW), None);
        assert!(positions.list_at(NOW).is_empty());
        assert!(!positions.forget("/m/a.mkv"));
    }

    #[test]
    fn test_get_returns_stored_record() {
        let (_, positions) = store();
        positions.save_at("file:///m/a.mkv", 42.3, NOW);

        let record = positions.get_at("/m/a.mkv", NOW + 1000).unwrap();
        assert_eq!(record.video_identity, "/m/a.mkv");
        assert_eq!(record.offset_seconds, 42.3);
        assert_eq!(record.saved_at_epoch_ms, NOW);

        assert_eq!(positions.get_at("/m/a.mkv", NOW + 31 * DAY_MS), None);
    }

    #[tokio::test]
    async fn test_writer_applies_saves_in_order() {
        let (_, positions) = store();
        let writer = PositionWriter::spawn(positions.clone());
        assert!(writer.queue("/m/a.mkv", 10.0));
        assert!(writer.queue("/m/a.mkv", 3.0));
        assert!(writer.queue("/m/a.mkv", 20.5));
        writer.finish().await;

        assert_eq!(positions.load("/m/a.mkv"), Some(20.5));
    }

    #[test]
    fn test_key_is_normalized_and_encoded() {
        assert_eq!(
            PositionStore::key(" /m/My Film.mkv "),
            "shelfplay.position:%2Fm%2FMy%20Film.mkv"
        );
        assert_eq!(
            PositionStore::key("file:///m/My%20Film.mkv"),
            PositionStore::key("/m/My Film.mkv")
        );
    }

    #[test]
    fn test_list_and_purge() {
        let (_, positions) = store();
        positions.save_at("/m/old.mkv", 50.0, NOW - 40 * DAY_MS);
        positions.save_at("/m/a.mkv", 60.0, NOW - DAY_MS);
        positions.save_at("/m/b.mkv", 70.0, NOW);

        let listed = positions.list_at(NOW);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].video_identity, "/m/b.mkv");
        assert_eq!(listed[1].video_identity, "/m/a.mkv");

        // Already purged by list
        assert_eq!(positions.purge_expired_at(NOW), 0);
        assert_eq!(positions.purge_expired_at(NOW + 31 * DAY_MS), 2);
    }
}
