//! shelfplay - local video playback for a personal media shelf
//!
//! Plays local files directly, or through the host's loopback transcoding
//! endpoint when the container needs it. Remembers where you stopped,
//! lets you switch audio tracks mid-stream, and follows the host window
//! in and out of fullscreen.
//!
//! # Modules
//!
//! - `models` - References, positions, tracks, stream requests, errors
//! - `store` - Key-value persistence backends
//! - `api` - Streaming endpoint client
//! - `host` - Host window-manager capabilities
//! - `playback` - Controller, fullscreen coordinator and session facade
//! - `config` - User configuration

pub mod api;
pub mod config;
pub mod host;
pub mod models;
pub mod playback;
pub mod store;

// Re-export commonly used types
pub use models::{
    FullscreenState, PlaybackError, PlaybackErrorKind, PlaybackPosition, ReferenceKind,
    StreamRequest, TrackDescriptor, TrackKind, TrackSelection, VideoReference, VideoTracks,
};

pub use api::StreamEndpointClient;
pub use host::{HostReply, HostWindow, OpenReply, SystemHost};
pub use playback::{PlaybackSession, SessionDeps, SessionHandle, SessionInput, SessionView};
