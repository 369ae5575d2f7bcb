//! Playback session facade
//!
//! One session per open video. It owns a [`PlaybackController`], a
//! [`TrackCatalog`] and a [`FullscreenCoordinator`], runs them on a single
//! event loop, and publishes a [`SessionView`] snapshot after every event.
//!
//! Host calls and the track query are spawned and report back over an
//! internal channel, so the loop never waits on them. Every report carries
//! the session id; reports for another session or arriving after close are
//! dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::host::{HostReply, HostWindow, OpenReply};
use crate::models::{
    is_web_url, FullscreenState, PlaybackError, ReferenceKind, TrackDescriptor, TrackSelection,
    VideoReference, VideoTracks,
};
use crate::playback::controller::{MediaElement, MediaEvent, PlaybackController, PlaybackState};
use crate::playback::fullscreen::{EscapeAction, FullscreenCoordinator, POLL_INTERVAL};
use crate::playback::position::PositionStore;
use crate::playback::tracks::{self, TrackCatalog, TrackInspector};

/// Called once when the session closes
pub type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

// =============================================================================
// Inputs and View
// =============================================================================

/// Everything the surface can tell the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Event from the native player
    Media(MediaEvent),
    Play,
    Pause,
    TogglePlay,
    /// Scrub bar released at an absolute position in seconds
    Seek(f64),
    /// Audio track chosen in the selector, by global index
    SelectAudio(u32),
    PointerMoved,
    PointerLeft,
    ToggleFullscreen,
    Escape,
    /// Hand the file to the system's external player
    OpenExternally,
    Close,
}

/// Snapshot of everything the surface renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub title: String,
    pub reference: VideoReference,
    pub state: PlaybackState,
    pub position_seconds: f64,
    pub fullscreen: FullscreenState,
    pub audio_tracks: Vec<TrackDescriptor>,
    pub subtitle_tracks: Vec<TrackDescriptor>,
    pub selection: TrackSelection,
    pub selector_visible: bool,
    pub error: Option<PlaybackError>,
    /// Offer the external-player escape hatch
    pub offer_external: bool,
    /// Transient message, e.g. a failed hand-off
    pub notice: Option<String>,
    pub rebuilds: u32,
}

/// Results of spawned work, fed back into the loop
#[derive(Debug)]
enum Report {
    Tracks {
        session: Uuid,
        file_path: String,
        tracks: VideoTracks,
    },
    FullscreenPolled {
        session: Uuid,
        /// Toggle generation when the poll was sent
        generation: u64,
        reply: HostReply,
    },
    FullscreenToggled {
        session: Uuid,
        reply: HostReply,
    },
    Opened {
        session: Uuid,
        reply: OpenReply,
    },
}

impl Report {
    fn session(&self) -> Uuid {
        match self {
            Report::Tracks { session, .. }
            | Report::FullscreenPolled { session, .. }
            | Report::FullscreenToggled { session, .. }
            | Report::Opened { session, .. } => *session,
        }
    }
}

/// Collaborators a session is built from
pub struct SessionDeps {
    pub element: Box<dyn MediaElement>,
    pub positions: PositionStore,
    pub inspector: Arc<dyn TrackInspector>,
    pub host: Arc<dyn HostWindow>,
}

// =============================================================================
// Session
// =============================================================================

/// A single open video and its presentation
pub struct PlaybackSession {
    id: Uuid,
    title: String,
    reference: VideoReference,
    controller: PlaybackController,
    catalog: TrackCatalog,
    coordinator: FullscreenCoordinator,
    inspector: Arc<dyn TrackInspector>,
    host: Arc<dyn HostWindow>,
    reports_tx: mpsc::UnboundedSender<Report>,
    reports_rx: Option<mpsc::UnboundedReceiver<Report>>,
    view_tx: watch::Sender<SessionView>,
    on_close: Option<CloseCallback>,
    notice: Option<String>,
    /// Bumped on every toggle request; polls sent before it are stale
    toggle_generation: u64,
    toggles_in_flight: u32,
    closed: bool,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("reference", &self.reference)
            .field("controller", &self.controller)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Handle to a session running on the tokio runtime
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    inputs: mpsc::UnboundedSender<SessionInput>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue an input. Returns false once the session has ended.
    pub fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver for change notifications
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the session and wait for its loop to finish
    pub async fn close(self) {
        let _ = self.inputs.send(SessionInput::Close);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "session task ended abnormally");
        }
    }
}

impl PlaybackSession {
    /// Open a video and run its session on the current tokio runtime.
    ///
    /// An absent or blank reference opens nothing and returns None.
    pub fn open(
        reference: Option<&str>,
        title: Option<&str>,
        on_close: impl FnOnce() + Send + 'static,
        deps: SessionDeps,
    ) -> Option<SessionHandle> {
        let session = Self::new(reference, title, on_close, deps)?;
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let id = session.id;
        let view = session.view_tx.subscribe();
        let task = tokio::spawn(session.run(inputs_rx));
        Some(SessionHandle {
            id,
            inputs: inputs_tx,
            view,
            task,
        })
    }

    /// Build a session without starting its loop
    pub fn new(
        reference: Option<&str>,
        title: Option<&str>,
        on_close: impl FnOnce() + Send + 'static,
        deps: SessionDeps,
    ) -> Option<Self> {
        let reference = VideoReference::classify(reference?)?;
        let id = Uuid::new_v4();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| display_name(&reference));

        let mut controller = PlaybackController::new(deps.element, deps.positions);
        controller.open(reference.clone());

        let catalog = match reference.kind {
            ReferenceKind::Streamed => TrackCatalog::for_file(reference.file_path()),
            ReferenceKind::Direct => TrackCatalog::new(),
        };

        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(SessionView {
            session_id: id,
            title: title.clone(),
            reference: reference.clone(),
            state: controller.state(),
            position_seconds: controller.current_time(),
            fullscreen: FullscreenState::default(),
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            selection: TrackSelection::default(),
            selector_visible: false,
            error: None,
            offer_external: false,
            notice: None,
            rebuilds: 0,
        });

        tracing::info!(session = %id, title = %title, kind = %reference.kind, "session opened");

        Some(Self {
            id,
            title,
            reference,
            controller,
            catalog,
            coordinator: FullscreenCoordinator::new(),
            inspector: deps.inspector,
            host: deps.host,
            reports_tx,
            reports_rx: Some(reports_rx),
            view_tx,
            on_close: Some(Box::new(on_close)),
            notice: None,
            toggle_generation: 0,
            toggles_in_flight: 0,
            closed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &FullscreenCoordinator {
        &self.coordinator
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// Drive the session until it closes or its input channel is dropped.
    /// Position saves queued along the way have landed when this returns.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        let Some(mut reports) = self.reports_rx.take() else {
            return;
        };

        self.controller.start_writer();
        self.start_track_query();
        self.publish();

        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.closed {
            let deadline = self.coordinator.next_deadline();

            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => self.close(),
                },
                Some(report) = reports.recv() => self.apply_report(report),
                _ = poll.tick() => self.poll_fullscreen(),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.coordinator.fire_due(Instant::now());
                }
            }

            self.publish();
        }

        if let Some(writer) = self.controller.take_writer() {
            writer.finish().await;
        }
    }

    /// Apply one input synchronously
    pub fn handle_input(&mut self, input: SessionInput) {
        if self.closed {
            return;
        }

        match input {
            SessionInput::Media(event) => {
                if let Some(error) = self.controller.handle_event(event) {
                    tracing::info!(session = %self.id, "offering external player: {}", error);
                }
            }
            SessionInput::Play => self.controller.play(),
            SessionInput::Pause => self.controller.pause(),
            SessionInput::TogglePlay => self.controller.toggle_play(),
            SessionInput::Seek(seconds) => {
                self.controller.seek_completed(seconds);
            }
            SessionInput::SelectAudio(index) => self.select_audio(index),
            SessionInput::PointerMoved => self.coordinator.pointer_moved(Instant::now()),
            SessionInput::PointerLeft => self.coordinator.pointer_left(),
            SessionInput::ToggleFullscreen => self.request_toggle(),
            SessionInput::Escape => match self.coordinator.escape() {
                EscapeAction::ExitFullscreen => self.request_toggle(),
                EscapeAction::CloseSession => self.close(),
            },
            SessionInput::OpenExternally => self.open_externally(),
            SessionInput::Close => self.close(),
        }
    }

    /// Final save, stop timers, drop interest in pending work, notify the caller
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.controller.close();
        self.coordinator.reset();
        self.catalog.clear();
        self.closed = true;
        tracing::info!(session = %self.id, "session closed");
        self.publish();

        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }

    // -------------------------------------------------------------------------
    // Spawned work
    // -------------------------------------------------------------------------

    fn start_track_query(&self) {
        let Some(file_path) = self.catalog.file_path().map(str::to_string) else {
            return;
        };
        let inspector = Arc::clone(&self.inspector);
        let tx = self.reports_tx.clone();
        let session = self.id;
        tokio::spawn(async move {
            let tracks = tracks::load_tracks(inspector.as_ref(), &file_path).await;
            let _ = tx.send(Report::Tracks {
                session,
                file_path,
                tracks,
            });
        });
    }

    fn poll_fullscreen(&mut self) {
        if !self.coordinator.begin_poll() {
            return;
        }
        let host = Arc::clone(&self.host);
        let tx = self.reports_tx.clone();
        let session = self.id;
        let generation = self.toggle_generation;
        tokio::spawn(async move {
            let reply = host.is_fullscreen().await;
            let _ = tx.send(Report::FullscreenPolled {
                session,
                generation,
                reply,
            });
        });
    }

    fn request_toggle(&mut self) {
        self.toggle_generation += 1;
        self.toggles_in_flight += 1;
        let host = Arc::clone(&self.host);
        let tx = self.reports_tx.clone();
        let session = self.id;
        tokio::spawn(async move {
            let reply = host.toggle_fullscreen().await;
            let _ = tx.send(Report::FullscreenToggled { session, reply });
        });
    }

    fn open_externally(&mut self) {
        let host = Arc::clone(&self.host);
        let tx = self.reports_tx.clone();
        let session = self.id;
        let reference = self.reference.clone();
        self.controller.pause();
        tokio::spawn(async move {
            let reply = match reference.kind {
                ReferenceKind::Direct if is_web_url(&reference.identity) => {
                    host.open_external(&reference.identity).await
                }
                _ => host.open_path(&reference.file_path()).await,
            };
            let _ = tx.send(Report::Opened { session, reply });
        });
    }

    fn apply_report(&mut self, report: Report) {
        if self.closed || report.session() != self.id {
            tracing::debug!(session = %self.id, "dropping stale report");
            return;
        }

        match report {
            Report::Tracks {
                file_path, tracks, ..
            } => {
                let requested = self
                    .controller
                    .request()
                    .and_then(|r| r.audio_global_index);
                if !self.catalog.apply(&file_path, tracks, requested) {
                    tracing::debug!(file_path = %file_path, "dropping track listing for another file");
                }
            }
            Report::FullscreenPolled {
                generation, reply, ..
            } => {
                self.coordinator.finish_poll();
                if generation != self.toggle_generation || self.toggles_in_flight > 0 {
                    tracing::debug!(session = %self.id, "dropping poll that raced a toggle");
                } else if reply.success {
                    self.coordinator
                        .host_reported(reply.is_full_screen, Instant::now());
                }
            }
            Report::FullscreenToggled { reply, .. } => {
                self.toggles_in_flight = self.toggles_in_flight.saturating_sub(1);
                if reply.success {
                    self.coordinator
                        .host_reported(reply.is_full_screen, Instant::now());
                } else {
                    tracing::warn!(session = %self.id, "host refused fullscreen toggle");
                }
            }
            Report::Opened { reply, .. } => {
                if reply.success {
                    self.notice = None;
                } else {
                    let error = reply
                        .error
                        .unwrap_or_else(|| "Could not open external player".to_string());
                    tracing::warn!(session = %self.id, error = %error, "external hand-off failed");
                    self.notice = Some(error);
                }
            }
        }
    }

    fn select_audio(&mut self, index: u32) {
        if !self.catalog.select_audio(index) {
            tracing::debug!(index, "ignoring unknown audio track");
            return;
        }
        self.controller.select_audio(index);
    }

    // -------------------------------------------------------------------------
    // View
    // -------------------------------------------------------------------------

    /// Current snapshot
    pub fn view(&self) -> SessionView {
        let error = self.controller.error().cloned();
        SessionView {
            session_id: self.id,
            title: self.title.clone(),
            reference: self.reference.clone(),
            state: self.controller.state(),
            position_seconds: self.controller.current_time(),
            fullscreen: self.coordinator.state(),
            audio_tracks: self.catalog.audio().to_vec(),
            subtitle_tracks: self.catalog.subtitles().to_vec(),
            selection: self.catalog.selection(),
            selector_visible: self.catalog.selector_visible(),
            offer_external: error.is_some(),
            error,
            notice: self.notice.clone(),
            rebuilds: self.controller.rebuild_count(),
        }
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

/// File name of a reference, used when no title is given
fn display_name(reference: &VideoReference) -> String {
    let path = reference.file_path();
    path.rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(path.as_str())
        .to_string()
}
