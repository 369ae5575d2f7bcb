//! Track catalog
//!
//! Holds the audio/subtitle tracks reported by the streaming endpoint for the
//! open file, and the user's audio choice. Subtitles are listed for
//! information only: the transcoded stream does not carry them.

use async_trait::async_trait;

use crate::models::{TrackDescriptor, TrackSelection, VideoTracks};

/// Source of track listings for a file
#[async_trait]
pub trait TrackInspector: Send + Sync {
    async fn video_tracks(&self, file_path: &str) -> anyhow::Result<VideoTracks>;
}

/// Query the inspector, degrading to empty lists on failure
pub async fn load_tracks(inspector: &dyn TrackInspector, file_path: &str) -> VideoTracks {
    match inspector.video_tracks(file_path).await {
        Ok(tracks) => {
            tracing::debug!(
                file_path,
                audio = tracks.audio.len(),
                subtitles = tracks.subtitles.len(),
                "loaded video tracks"
            );
            tracks
        }
        Err(e) => {
            tracing::warn!(file_path, error = %e, "track query failed, using default tracks");
            VideoTracks::default()
        }
    }
}

/// Tracks and selection for the file currently open in a session
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    file_path: Option<String>,
    tracks: VideoTracks,
    selection: TrackSelection,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog waiting for the listing of `file_path`
    pub fn for_file(file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            ..Self::default()
        }
    }

    /// File whose listing this catalog accepts
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    /// Install a listing. `requested_audio` is the audio index already encoded
    /// in the open stream request, which wins over the first-track default
    /// when it names a listed track.
    ///
    /// Returns false, leaving the catalog untouched, when the listing belongs
    /// to a different file.
    pub fn apply(
        &mut self,
        file_path: &str,
        tracks: VideoTracks,
        requested_audio: Option<u32>,
    ) -> bool {
        if self.file_path.as_deref() != Some(file_path) {
            return false;
        }

        let listed = |index: u32| tracks.audio.iter().any(|t| t.global_index == index);
        let audio_global_index = match requested_audio {
            Some(index) if listed(index) => Some(index),
            _ if tracks.audio.len() > 1 => tracks.audio.first().map(|t| t.global_index),
            _ => None,
        };

        self.selection = TrackSelection {
            audio_global_index,
            subtitle_global_index: None,
        };
        self.tracks = tracks;
        true
    }

    pub fn audio(&self) -> &[TrackDescriptor] {
        &self.tracks.audio
    }

    pub fn subtitles(&self) -> &[TrackDescriptor] {
        &self.tracks.subtitles
    }

    pub fn selection(&self) -> TrackSelection {
        self.selection
    }

    /// The audio selector is only offered when there is a choice to make
    pub fn selector_visible(&self) -> bool {
        self.tracks.audio.len() > 1
    }

    /// Choose an audio track by global index. Unknown indices are rejected.
    pub fn select_audio(&mut self, global_index: u32) -> bool {
        if !self
            .tracks
            .audio
            .iter()
            .any(|t| t.global_index == global_index)
        {
            return false;
        }
        self.selection.audio_global_index = Some(global_index);
        true
    }

    /// Currently selected audio track
    pub fn selected_audio(&self) -> Option<&TrackDescriptor> {
        let index = self.selection.audio_global_index?;
        self.tracks.audio.iter().find(|t| t.global_index == index)
    }

    /// Forget the listing and selection
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackKind;

    fn audio(global_index: u32, local_index: u32, language: &str) -> TrackDescriptor {
        TrackDescriptor {
            global_index,
            local_index: Some(local_index),
            kind: TrackKind::Audio,
            language: Some(language.to_string()),
            title: None,
            codec: Some("aac".to_string()),
        }
    }

    fn three_tracks() -> VideoTracks {
        VideoTracks {
            audio: vec![audio(1, 0, "jpn"), audio(2, 1, "eng"), audio(4, 2, "fre")],
            subtitles: vec![TrackDescriptor {
                global_index: 3,
                local_index: None,
                kind: TrackKind::Subtitle,
                language: Some("eng".to_string()),
                title: None,
                codec: Some("ass".to_string()),
            }],
        }
    }

    #[test]
    fn test_default_is_first_track_when_several() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        assert!(catalog.apply("/m/a.mkv", three_tracks(), None));
        assert!(catalog.selector_visible());
        assert_eq!(catalog.selection().audio_global_index, Some(1));
        assert_eq!(catalog.selection().subtitle_global_index, None);
    }

    #[test]
    fn test_requested_audio_overrides_default() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        catalog.apply("/m/a.mkv", three_tracks(), Some(4));
        assert_eq!(catalog.selection().audio_global_index, Some(4));
    }

    #[test]
    fn test_unlisted_requested_audio_falls_back() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        catalog.apply("/m/a.mkv", three_tracks(), Some(9));
        assert_eq!(catalog.selection().audio_global_index, Some(1));
    }

    #[test]
    fn test_single_track_has_no_selector() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        let tracks = VideoTracks {
            audio: vec![audio(1, 0, "eng")],
            subtitles: vec![],
        };
        catalog.apply("/m/a.mkv", tracks, None);
        assert!(!catalog.selector_visible());
        assert_eq!(catalog.selection().audio_global_index, None);
    }

    #[test]
    fn test_listing_for_other_file_is_ignored() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        assert!(!catalog.apply("/m/b.mkv", three_tracks(), None));
        assert!(catalog.audio().is_empty());

        let mut closed = TrackCatalog::new();
        assert!(!closed.apply("/m/a.mkv", three_tracks(), None));
    }

    #[test]
    fn test_select_audio_validates_index() {
        let mut catalog = TrackCatalog::for_file("/m/a.mkv");
        catalog.apply("/m/a.mkv", three_tracks(), None);
        assert!(catalog.select_audio(2));
        assert_eq!(catalog.selected_audio().unwrap().language.as_deref(), Some("eng"));
        assert!(!catalog.select_audio(3)); // subtitle index, not audio
        assert_eq!(catalog.selection().audio_global_index, Some(2));
    }
}
