//! Data structures and types for shelfplay
//!
//! Contains the shared models used across the playback session, organized by domain:
//! - **References**: what the user asked to play and how it is fetched
//! - **Positions**: persisted resume offsets
//! - **Tracks**: audio/subtitle descriptors and the current selection
//! - **Stream requests**: the local streaming endpoint's query protocol
//! - **Presentation**: fullscreen and chrome visibility
//! - **Errors**: typed playback failures

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use url::form_urlencoded;

/// Matches the local streaming endpoint: loopback host, explicit port, query string.
fn endpoint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(https?://(?:127\.0\.0\.1|localhost|\[::1\]):\d{1,5})/?\?(.*)$")
            .expect("endpoint pattern is valid")
    })
}

// =============================================================================
// Video References
// =============================================================================

/// How a reference is fetched by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Natively playable file or URL
    Direct,
    /// Served through the local transcoding endpoint
    Streamed,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Direct => write!(f, "direct"),
            ReferenceKind::Streamed => write!(f, "streamed"),
        }
    }
}

/// A video the user asked to play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoReference {
    /// The reference string exactly as handed to the session
    pub identity: String,
    pub kind: ReferenceKind,
}

impl VideoReference {
    /// Classify a reference string. Returns None for empty input.
    pub fn classify(reference: &str) -> Option<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return None;
        }

        let kind = if StreamRequest::parse(trimmed).is_some() {
            ReferenceKind::Streamed
        } else {
            ReferenceKind::Direct
        };

        Some(Self {
            identity: trimmed.to_string(),
            kind,
        })
    }

    pub fn is_streamed(&self) -> bool {
        self.kind == ReferenceKind::Streamed
    }

    /// Parsed stream request for streamed references
    pub fn stream_request(&self) -> Option<StreamRequest> {
        match self.kind {
            ReferenceKind::Streamed => StreamRequest::parse(&self.identity),
            ReferenceKind::Direct => None,
        }
    }

    /// Underlying file path: the `file` parameter for streamed references,
    /// the normalized reference otherwise.
    pub fn file_path(&self) -> String {
        match self.stream_request() {
            Some(request) => request.file_path,
            None => normalize_identity(&self.identity),
        }
    }

    /// Key under which the resume offset is stored.
    ///
    /// Streamed references resolve to their file path so that track and
    /// offset variants of the same file share one history.
    pub fn position_identity(&self) -> String {
        normalize_identity(&self.file_path())
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.identity, self.kind)
    }
}

/// True for `http://` and `https://` addresses, in any letter case.
pub fn is_web_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Canonical form of a video identity.
///
/// Whitespace is trimmed and `file://` URLs are reduced to their decoded path.
/// Case is preserved: local paths are case-sensitive.
pub fn normalize_identity(identity: &str) -> String {
    let trimmed = identity.trim();
    match trimmed.strip_prefix("file://") {
        Some(path) => urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string()),
        None => trimmed.to_string(),
    }
}

// =============================================================================
// Positions
// =============================================================================

/// Last known playback offset for one video identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub video_identity: String,
    pub offset_seconds: f64,
    pub saved_at_epoch_ms: i64,
}

impl fmt::Display for PlaybackPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.video_identity,
            format_clock(self.offset_seconds)
        )
    }
}

/// Format seconds as `H:MM:SS` or `M:SS`
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

// =============================================================================
// Tracks
// =============================================================================

/// Track type within a demuxed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

/// A single audio or subtitle track reported by the streaming endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Index within the full demuxed stream; this is what the endpoint addresses
    pub global_index: u32,
    /// Position among audio tracks only (None for subtitles)
    pub local_index: Option<u32>,
    pub kind: TrackKind,
    pub language: Option<String>,
    pub title: Option<String>,
    pub codec: Option<String>,
}

impl fmt::Display for TrackDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let position = self.local_index.map(|i| i + 1).unwrap_or(self.global_index);
        write!(f, "#{}", position)?;
        if let Some(language) = &self.language {
            write!(f, " {}", language)?;
        }
        if let Some(title) = &self.title {
            write!(f, " {}", title)?;
        }
        if let Some(codec) = &self.codec {
            write!(f, " ({})", codec)?;
        }
        Ok(())
    }
}

/// All tracks of one file, split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTracks {
    pub audio: Vec<TrackDescriptor>,
    pub subtitles: Vec<TrackDescriptor>,
}

impl VideoTracks {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.subtitles.is_empty()
    }
}

/// The user's current track choice, addressed by global index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    pub audio_global_index: Option<u32>,
    pub subtitle_global_index: Option<u32>,
}

// =============================================================================
// Stream Requests
// =============================================================================

/// A request against the local streaming endpoint.
///
/// Wire form: `<endpoint>/?file=<path>&start=<seconds>&audioTrack=<n>&subtitleTrack=<n>`.
/// Only `file` is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Scheme, host and port, e.g. `http://127.0.0.1:8766`
    pub endpoint: String,
    pub file_path: String,
    pub start_offset_seconds: Option<f64>,
    pub audio_global_index: Option<u32>,
    pub subtitle_global_index: Option<u32>,
    /// Unrecognized parameters, kept in their original order
    pub extra: Vec<(String, String)>,
}

impl StreamRequest {
    /// Parse a streaming URL. Returns None unless the address is the local
    /// endpoint and a non-empty `file` parameter is present.
    pub fn parse(url: &str) -> Option<Self> {
        let caps = endpoint_pattern().captures(url.trim())?;
        let endpoint = caps.get(1)?.as_str().to_string();
        let query = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let mut request = StreamRequest {
            endpoint,
            file_path: String::new(),
            start_offset_seconds: None,
            audio_global_index: None,
            subtitle_global_index: None,
            extra: Vec::new(),
        };

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "file" => request.file_path = value.into_owned(),
                "start" => {
                    request.start_offset_seconds =
                        value.parse::<f64>().ok().filter(|s| s.is_finite())
                }
                "audioTrack" => request.audio_global_index = value.parse().ok(),
                "subtitleTrack" => request.subtitle_global_index = value.parse().ok(),
                _ => request.extra.push((key.into_owned(), value.into_owned())),
            }
        }

        if request.file_path.is_empty() {
            return None;
        }
        Some(request)
    }

    /// Serialize back to a URL. Parameter order is fixed, so equal requests
    /// always produce byte-identical strings.
    pub fn to_url(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("file", &self.file_path);
        if let Some(start) = self.start_offset_seconds {
            query.append_pair("start", &format!("{:.2}", start));
        }
        if let Some(audio) = self.audio_global_index {
            query.append_pair("audioTrack", &audio.to_string());
        }
        if let Some(subtitle) = self.subtitle_global_index {
            query.append_pair("subtitleTrack", &subtitle.to_string());
        }
        query.extend_pairs(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        format!("{}/?{}", self.endpoint, query.finish())
    }

    /// Encoded start, treating an absent parameter as zero
    pub fn start(&self) -> f64 {
        self.start_offset_seconds.unwrap_or(0.0)
    }
}

impl fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}


// =============================================================================
// Presentation
// =============================================================================

/// Fullscreen and chrome visibility. Everything resets when fullscreen ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullscreenState {
    pub is_fullscreen: bool,
    pub overlay_visible: bool,
    pub pointer_hidden: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Native playback failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    Aborted,
    Network,
    Decode,
    FormatUnsupported,
    Unknown(u16),
}

impl PlaybackErrorKind {
    /// Map a native media error code (1 aborted, 2 network, 3 decode, 4 unsupported source)
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PlaybackErrorKind::Aborted,
            2 => PlaybackErrorKind::Network,
            3 => PlaybackErrorKind::Decode,
            4 => PlaybackErrorKind::FormatUnsupported,
            other => PlaybackErrorKind::Unknown(other),
        }
    }

    /// User-facing description
    pub fn message(&self) -> String {
        match self {
            PlaybackErrorKind::Aborted => "Playback was aborted.".to_string(),
            PlaybackErrorKind::Network => {
                "A network error interrupted the video stream.".to_string()
            }
            PlaybackErrorKind::Decode => {
                "The video could not be decoded. The format may be unsupported or the file corrupt."
                    .to_string()
            }
            PlaybackErrorKind::FormatUnsupported => {
                "This video format is not supported by the built-in player.".to_string()
            }
            PlaybackErrorKind::Unknown(code) => {
                format!("Playback failed with an unknown error (code {}).", code)
            }
        }
    }
}

/// A playback failure as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", .kind.message())]
pub struct PlaybackError {
    pub kind: PlaybackErrorKind,
    /// Native diagnostic text, if the player gave one
    pub detail: Option<String>,
}

impl PlaybackError {
    pub fn from_code(code: u16, detail: Option<String>) -> Self {
        Self {
            kind: PlaybackErrorKind::from_code(code),
            detail,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
