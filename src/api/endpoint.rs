//! Local streaming endpoint client
//!
//! The host app runs a small transcoding server on the loopback interface.
//! Playback URLs are built by `playback::url`; this client covers the
//! companion inspection call that lists a file's audio and subtitle tracks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{TrackDescriptor, TrackKind, VideoTracks};
use crate::playback::TrackInspector;

/// Default loopback port of the streaming endpoint
pub const DEFAULT_PORT: u16 = 8766;

/// Inspection response
#[derive(Debug, Deserialize)]
struct TracksResponse {
    #[serde(default)]
    audio: Vec<EndpointTrack>,
    #[serde(default)]
    subtitles: Vec<EndpointTrack>,
}

/// Single track as reported by the endpoint
#[derive(Debug, Deserialize)]
struct EndpointTrack {
    /// Index within the demuxed stream
    index: u32,
    #[serde(alias = "lang")]
    language: Option<String>,
    title: Option<String>,
    #[serde(alias = "codec_name")]
    codec: Option<String>,
}

impl EndpointTrack {
    /// Convert to our descriptor; audio tracks get their position among audio tracks
    fn into_descriptor(self, kind: TrackKind, position: usize) -> TrackDescriptor {
        TrackDescriptor {
            global_index: self.index,
            local_index: match kind {
                TrackKind::Audio => Some(position as u32),
                TrackKind::Subtitle => None,
            },
            kind,
            language: self.language.filter(|l| !l.is_empty()),
            title: self.title.filter(|t| !t.is_empty()),
            codec: self.codec.filter(|c| !c.is_empty()),
        }
    }
}

/// HTTP client for the local streaming endpoint
#[derive(Debug, Clone)]
pub struct StreamEndpointClient {
    base_url: String,
    client: reqwest::Client,
}

impl StreamEndpointClient {
    /// Client for the endpoint on the default loopback port
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    /// Client for the loopback endpoint on a specific port
    pub fn with_port(port: u16) -> Self {
        Self::with_base_url(format!("http://127.0.0.1:{}", port))
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Endpoint base, e.g. `http://127.0.0.1:8766`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the audio and subtitle tracks of a file
    pub async fn video_tracks(&self, file_path: &str) -> Result<VideoTracks> {
        let url = format!(
            "{}/tracks?file={}",
            self.base_url,
            urlencoding::encode(file_path)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach streaming endpoint")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Streaming endpoint returned HTTP {}", status);
        }

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let data: TracksResponse =
            serde_json::from_str(&text).context("Failed to parse track listing")?;

        Ok(VideoTracks {
            audio: data
                .audio
                .into_iter()
                .enumerate()
                .map(|(i, t)| t.into_descriptor(TrackKind::Audio, i))
                .collect(),
            subtitles: data
                .subtitles
                .into_iter()
                .enumerate()
                .map(|(i, t)| t.into_descriptor(TrackKind::Subtitle, i))
                .collect(),
        })
    }
}

impl Default for StreamEndpointClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackInspector for StreamEndpointClient {
    async fn video_tracks(&self, file_path: &str) -> Result<VideoTracks> {
        StreamEndpointClient::video_tracks(self, file_path).await
    }
}
