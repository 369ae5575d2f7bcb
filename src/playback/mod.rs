//! Playback session components
//!
//! - Position: resume offsets per video
//! - Tracks: audio/subtitle listing and selection
//! - Url: stream request derivation
//! - Controller: play/pause/seek state machine
//! - Fullscreen: theater presentation and chrome auto-hide
//! - Session: the facade composing all of the above

pub mod controller;
pub mod fullscreen;
pub mod position;
pub mod session;
pub mod tracks;
pub mod url;

pub use controller::{MediaElement, MediaEvent, PlaybackController, PlaybackState};
pub use fullscreen::{EscapeAction, FullscreenCoordinator, RestartableTimer};
pub use position::{PositionStore, PositionWriter};
pub use session::{PlaybackSession, SessionDeps, SessionHandle, SessionInput, SessionView};
pub use tracks::{TrackCatalog, TrackInspector};
pub use url::StreamOverrides;
