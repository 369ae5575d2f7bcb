//! Playback controller
//!
//! Owns the play/pause/seek lifecycle of one open video. For streamed
//! references every seek past the re-issue threshold and every audio track
//! change rebuilds the stream URL and reloads the element; the new stream
//! starts at the requested offset, so element time restarts from zero and
//! the absolute position is `encoded start + element time`.

use std::fmt;

use crate::models::{PlaybackError, StreamRequest, VideoReference};
use crate::playback::position::{PositionStore, PositionWriter, MIN_RESUME_SECONDS};
use crate::playback::url::{self, StreamOverrides};

/// Positions are captured each time playback crosses a multiple of this
pub const CAPTURE_INTERVAL_SECONDS: f64 = 10.0;

/// The native player surface
pub trait MediaElement: Send {
    fn set_source(&mut self, url: &str);
    fn load(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    /// Seek within the current source, in element time
    fn set_current_time(&mut self, seconds: f64);
}

/// Events reported by the native player
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Enough data is available to start `source`
    Ready { source: String },
    /// Element time, relative to the start of the current source
    TimeUpdate(f64),
    Playing,
    Paused,
    Ended,
    Error { code: u16, message: Option<String> },
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Erroring,
    Closed,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Erroring => "error",
            PlaybackState::Closed => "closed",
        };
        write!(f, "{}", label)
    }
}

/// Play/pause/seek state machine for one session
pub struct PlaybackController {
    element: Box<dyn MediaElement>,
    positions: PositionStore,
    /// Off-loop saver while a session runs; saves go inline without it
    writer: Option<PositionWriter>,
    reference: Option<VideoReference>,
    /// Current request for streamed references
    request: Option<StreamRequest>,
    /// URL currently loaded in the element
    source: Option<String>,
    state: PlaybackState,
    /// Whether the user wants playback running; read when a load completes
    desired_playing: bool,
    /// Direct references: resume offset applied once the element is ready
    pending_offset: Option<f64>,
    element_time: f64,
    last_bucket: Option<u64>,
    error: Option<PlaybackError>,
    rebuilds: u32,
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("reference", &self.reference)
            .field("source", &self.source)
            .field("state", &self.state)
            .field("element_time", &self.element_time)
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    pub fn new(element: Box<dyn MediaElement>, positions: PositionStore) -> Self {
        Self {
            element,
            positions,
            writer: None,
            reference: None,
            request: None,
            source: None,
            state: PlaybackState::Idle,
            desired_playing: false,
            pending_offset: None,
            element_time: 0.0,
            last_bucket: None,
            error: None,
            rebuilds: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        self.error.as_ref()
    }

    pub fn reference(&self) -> Option<&VideoReference> {
        self.reference.as_ref()
    }

    pub fn request(&self) -> Option<&StreamRequest> {
        self.request.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn is_streamed(&self) -> bool {
        self.request.is_some()
    }

    /// Number of stream rebuilds since open
    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds
    }

    /// Absolute playback position in seconds
    pub fn current_time(&self) -> f64 {
        match &self.request {
            Some(request) => request.start() + self.element_time,
            None => self.element_time,
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Load a reference and start playback once the element is ready
    pub fn open(&mut self, reference: VideoReference) {
        let identity = reference.position_identity();
        let resume = self.positions.load(&identity);

        self.state = PlaybackState::Loading;
        self.desired_playing = true;
        self.pending_offset = None;
        self.element_time = 0.0;
        self.last_bucket = None;
        self.error = None;
        self.rebuilds = 0;

        let source = match reference.stream_request() {
            Some(request) => {
                let request = match resume {
                    Some(offset) => url::build_request(
                        &request.endpoint,
                        &request.file_path,
                        Some(&request),
                        StreamOverrides {
                            start: Some(offset),
                            audio: request.audio_global_index,
                            subtitle: request.subtitle_global_index,
                        },
                    ),
                    None => request,
                };
                let source = request.to_url();
                self.request = Some(request);
                source
            }
            None => {
                self.request = None;
                self.pending_offset = resume;
                reference.identity.clone()
            }
        };

        tracing::info!(
            reference = %reference,
            resume = ?resume,
            "opening video"
        );

        self.reference = Some(reference);
        self.load_source(source);
    }

    /// Route saves through a background writer on the current runtime
    pub fn start_writer(&mut self) {
        if self.writer.is_none() {
            self.writer = Some(PositionWriter::spawn(self.positions.clone()));
        }
    }

    /// Detach the background writer so its queue can be drained
    pub fn take_writer(&mut self) -> Option<PositionWriter> {
        self.writer.take()
    }

    /// Final save and teardown. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == PlaybackState::Closed {
            return;
        }
        if self.reference.is_some() {
            self.save_position();
            self.element.pause();
        }
        tracing::debug!(position = self.current_time(), "playback closed");
        self.state = PlaybackState::Closed;
        self.desired_playing = false;
        self.pending_offset = None;
    }

    // -------------------------------------------------------------------------
    // User intents
    // -------------------------------------------------------------------------

    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Paused => {
                self.desired_playing = true;
                self.element.play();
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Loading => self.desired_playing = true,
            _ => {}
        }
    }

    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.desired_playing = false;
                self.element.pause();
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Loading => self.desired_playing = false,
            _ => {}
        }
    }

    pub fn toggle_play(&mut self) {
        if self.desired_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// The user finished scrubbing to an absolute position.
    ///
    /// Returns whether the stream was rebuilt.
    pub fn seek_completed(&mut self, target_seconds: f64) -> bool {
        if !self.is_active() {
            return false;
        }
        let target = target_seconds.max(0.0);

        let Some(request) = &self.request else {
            // An explicit seek beats the resume offset still waiting for readiness
            self.pending_offset = None;
            self.element.set_current_time(target);
            self.element_time = target;
            return false;
        };

        let start = request.start();
        if !url::needs_reissue(start, target) {
            let relative = (target - start).max(0.0);
            self.element.set_current_time(relative);
            self.element_time = relative;
            return false;
        }

        let overrides = StreamOverrides {
            start: Some(target),
            audio: request.audio_global_index,
            subtitle: request.subtitle_global_index,
        };
        self.rebuild(overrides);
        true
    }

    /// Switch the audio track of a streamed reference, continuing from the
    /// current position. Returns whether the stream was rebuilt.
    pub fn select_audio(&mut self, global_index: u32) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(request) = &self.request else {
            return false;
        };
        if request.audio_global_index == Some(global_index) {
            return false;
        }

        let overrides = StreamOverrides {
            start: Some(self.current_time()),
            audio: Some(global_index),
            subtitle: request.subtitle_global_index,
        };
        self.rebuild(overrides);
        true
    }

    // -------------------------------------------------------------------------
    // Element events
    // -------------------------------------------------------------------------

    /// Apply an element event. Returns a playback error when one was raised.
    pub fn handle_event(&mut self, event: MediaEvent) -> Option<PlaybackError> {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Closed) {
            return None;
        }

        match event {
            MediaEvent::Ready { source } => self.on_ready(&source),
            MediaEvent::TimeUpdate(seconds) => self.on_time_update(seconds),
            MediaEvent::Playing => {
                if self.state == PlaybackState::Paused {
                    self.desired_playing = true;
                    self.state = PlaybackState::Playing;
                }
            }
            MediaEvent::Paused => {
                if self.state == PlaybackState::Playing {
                    self.desired_playing = false;
                    self.state = PlaybackState::Paused;
                }
            }
            MediaEvent::Ended => {
                if self.state == PlaybackState::Playing {
                    self.desired_playing = false;
                    self.state = PlaybackState::Paused;
                }
            }
            MediaEvent::Error { code, message } => return Some(self.on_error(code, message)),
        }
        None
    }

    fn on_ready(&mut self, source: &str) {
        if self.state != PlaybackState::Loading || self.source.as_deref() != Some(source) {
            tracing::debug!(source, "ignoring readiness for superseded source");
            return;
        }

        if let Some(offset) = self.pending_offset.take() {
            self.element.set_current_time(offset);
            self.element_time = offset;
        }

        if self.desired_playing {
            self.element.play();
            self.state = PlaybackState::Playing;
        } else {
            self.state = PlaybackState::Paused;
        }
    }

    fn on_time_update(&mut self, seconds: f64) {
        if !seconds.is_finite() || self.state == PlaybackState::Loading {
            return;
        }
        self.element_time = seconds.max(0.0);
        if self.state != PlaybackState::Playing {
            return;
        }

        let position = self.current_time();
        let bucket = (position / CAPTURE_INTERVAL_SECONDS) as u64;
        let crossed = self.last_bucket.is_some_and(|last| last != bucket);
        self.last_bucket = Some(bucket);

        if crossed && position > MIN_RESUME_SECONDS {
            self.save_position();
        }
    }

    fn on_error(&mut self, code: u16, message: Option<String>) -> PlaybackError {
        let error = PlaybackError::from_code(code, message);
        tracing::warn!(
            kind = ?error.kind,
            detail = ?error.detail,
            source = ?self.source,
            "playback failed"
        );
        self.state = PlaybackState::Erroring;
        self.desired_playing = false;
        self.pending_offset = None;
        self.error = Some(error.clone());
        error
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn is_active(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Loading
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Erroring
        )
    }

    /// Replace the stream request and reload. Readiness of any earlier
    /// source is ignored from here on, and the resume decision is taken from
    /// `desired_playing` when the new source is ready.
    fn rebuild(&mut self, overrides: StreamOverrides) {
        let Some(current) = &self.request else {
            return;
        };
        let request =
            url::build_request(&current.endpoint, &current.file_path, Some(current), overrides);
        let source = request.to_url();

        tracing::debug!(
            source = %source,
            resume = self.desired_playing,
            "rebuilding stream"
        );

        self.request = Some(request);
        self.rebuilds += 1;
        self.error = None;
        if self.state == PlaybackState::Erroring {
            self.desired_playing = true;
        }
        self.state = PlaybackState::Loading;
        self.load_source(source);
        self.element.set_current_time(0.0);
        self.element_time = 0.0;
    }

    fn load_source(&mut self, source: String) {
        self.element.set_source(&source);
        self.element.load();
        self.source = Some(source);
    }

    fn save_position(&self) {
        let Some(reference) = &self.reference else {
            return;
        };
        let position = self.current_time();
        if position <= MIN_RESUME_SECONDS {
            return;
        }
        let identity = reference.position_identity();
        let queued = self
            .writer
            .as_ref()
            .is_some_and(|writer| writer.queue(&identity, position));
        if !queued {
            self.positions.save(&identity, position);
        }
    }
}
