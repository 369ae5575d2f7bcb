//! Resume position persistence tests
//!
//! Exercises PositionStore on top of the JSON file backend, the way the
//! binary uses it across runs.

use std::path::PathBuf;
use std::sync::Arc;

use shelfplay::playback::position::{KEY_PREFIX, MAX_AGE_MS};
use shelfplay::playback::PositionStore;
use shelfplay::store::{JsonFileStore, KeyValueStore};
use shelfplay::VideoReference;

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("shelfplay-test-{}", uuid::Uuid::new_v4()));
        Self(dir)
    }

    fn file(&self) -> PathBuf {
        self.0.join("positions.json")
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn store_at(path: PathBuf) -> PositionStore {
    PositionStore::new(Arc::new(JsonFileStore::new(path)))
}

#[test]
fn test_positions_survive_reopening_the_file() {
    let dir = TempDir::new();
    let now = 1_700_000_000_000;

    assert!(store_at(dir.file()).save_at("/movies/a.mkv", 42.3, now));
    assert_eq!(store_at(dir.file()).load_at("/movies/a.mkv", now + 1000), Some(42.3));
}

#[test]
fn test_streamed_and_direct_share_one_history() {
    let dir = TempDir::new();
    let positions = store_at(dir.file());
    let now = 1_700_000_000_000;

    let streamed =
        VideoReference::classify("http://127.0.0.1:8766/?file=%2Fmovies%2Fa.mkv&audioTrack=2")
            .unwrap();
    let file_url = VideoReference::classify("file:///movies/a.mkv").unwrap();
    assert_eq!(streamed.position_identity(), file_url.position_identity());

    positions.save_at(&streamed.position_identity(), 300.0, now);
    assert_eq!(
        positions.load_at(&file_url.position_identity(), now),
        Some(300.0)
    );
}

#[test]
fn test_list_and_purge() {
    let dir = TempDir::new();
    let positions = store_at(dir.file());
    let now = 1_700_000_000_000;

    positions.save_at("/movies/old.mkv", 100.0, now - MAX_AGE_MS - 1);
    positions.save_at("/movies/a.mkv", 50.0, now - 2000);
    positions.save_at("/movies/b.mkv", 60.0, now - 1000);

    // A foreign value under our prefix is treated as garbage
    let raw = JsonFileStore::new(dir.file());
    raw.set(&format!("{}broken", KEY_PREFIX), "not json").unwrap();
    raw.set("other.app:key", "untouched").unwrap();

    let listed = positions.list_at(now);
    let identities: Vec<&str> = listed.iter().map(|p| p.video_identity.as_str()).collect();
    assert_eq!(identities, vec!["/movies/b.mkv", "/movies/a.mkv"]);

    // Listing already dropped the stale entries
    assert_eq!(positions.purge_expired_at(now), 0);
    assert_eq!(raw.get("other.app:key").unwrap().as_deref(), Some("untouched"));
}

#[test]
fn test_forget() {
    let dir = TempDir::new();
    let positions = store_at(dir.file());
    let now = 1_700_000_000_000;

    positions.save_at("/movies/a.mkv", 50.0, now);
    assert!(positions.forget("/movies/a.mkv"));
    assert_eq!(positions.load_at("/movies/a.mkv", now), None);
}

#[cfg(target_os = "linux")]
#[test]
fn test_unwritable_location_degrades_silently() {
    let positions = store_at(PathBuf::from("/proc/shelfplay/positions.json"));
    assert!(!positions.save_at("/movies/a.mkv", 50.0, 1));
    assert_eq!(positions.load_at("/movies/a.mkv", 1), None);
}
