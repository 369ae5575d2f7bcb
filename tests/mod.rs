//! Integration tests for shelfplay
//!
//! Tests are organized by component:
//! - endpoint_test: streaming endpoint client (track inspection over HTTP)
//! - positions_test: resume positions on the JSON file backend
//! - session_test: full playback sessions on a paused clock

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
