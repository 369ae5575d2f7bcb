//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the library services.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::sync::Arc;

use serde::Serialize;

use shelfplay::config::Config;
use shelfplay::host::{HostWindow, SystemHost};
use shelfplay::models::{
    format_clock, is_web_url, PlaybackPosition, ReferenceKind, StreamRequest, VideoTracks,
};
use shelfplay::playback::{url, PositionStore, StreamOverrides};
use shelfplay::store::JsonFileStore;
use shelfplay::{StreamEndpointClient, VideoReference};

use crate::cli::{
    ClassifyCmd, ExitCode, OpenExternalCmd, Output, PositionsAction, PositionsCmd, StatusOk,
    TracksCmd, UrlCmd,
};

/// Settings shared by every handler
pub struct Context {
    pub config: Config,
    /// Port given on the command line, overriding env and config
    pub port: Option<u16>,
}

impl Context {
    pub fn endpoint_url(&self) -> String {
        match self.port {
            Some(port) => format!("http://127.0.0.1:{}", port),
            None => self.config.endpoint_url(),
        }
    }

    fn positions(&self) -> Option<PositionStore> {
        let path = self.config.positions_path()?;
        tracing::debug!(path = %path.display(), "using positions file");
        Some(PositionStore::new(Arc::new(JsonFileStore::new(path))))
    }
}

// =============================================================================
// Tracks Command
// =============================================================================

pub async fn tracks_cmd(cmd: TracksCmd, ctx: &Context, output: &Output) -> ExitCode {
    let client = StreamEndpointClient::with_base_url(ctx.endpoint_url());
    output.info(format!("Inspecting: {}", cmd.file));

    match client.video_tracks(&cmd.file).await {
        Ok(tracks) => {
            if tracks.is_empty() {
                output.info("The endpoint reported no tracks");
            }
            if output.json {
                if let Err(e) = output.print(&tracks) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            } else {
                print_tracks(&tracks);
            }
            ExitCode::Success
        }
        Err(e) => output.error(
            format!("Track inspection failed: {:#}", e),
            ExitCode::EndpointError,
        ),
    }
}

fn print_tracks(tracks: &VideoTracks) {
    println!("Audio:");
    if tracks.audio.is_empty() {
        println!("  (none)");
    }
    for track in &tracks.audio {
        println!("  {}  [index {}]", track, track.global_index);
    }
    println!("Subtitles:");
    if tracks.subtitles.is_empty() {
        println!("  (none)");
    }
    for track in &tracks.subtitles {
        println!("  {}  [index {}]", track, track.global_index);
    }
}

// =============================================================================
// Url Command
// =============================================================================

#[derive(Debug, Serialize)]
struct UrlResult {
    url: String,
    request: StreamRequest,
}

pub async fn url_cmd(cmd: UrlCmd, ctx: &Context, output: &Output) -> ExitCode {
    if cmd.file.trim().is_empty() {
        return output.error("File path must not be empty", ExitCode::InvalidArgs);
    }
    if let Some(start) = cmd.start {
        if !start.is_finite() || start < 0.0 {
            return output.error(
                format!("Invalid start offset: {}", start),
                ExitCode::InvalidArgs,
            );
        }
    }

    let overrides = StreamOverrides {
        start: cmd.start,
        audio: cmd.audio,
        subtitle: cmd.subtitle,
    };
    let request = url::build_request(&ctx.endpoint_url(), cmd.file.trim(), None, overrides);
    let result = UrlResult {
        url: request.to_url(),
        request,
    };

    match output.print_line(&result.url, &result) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Classify Command
// =============================================================================

#[derive(Debug, Serialize)]
struct ClassifyResult {
    identity: String,
    kind: ReferenceKind,
    file_path: String,
    position_identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<StreamRequest>,
}

pub async fn classify_cmd(cmd: ClassifyCmd, output: &Output) -> ExitCode {
    let Some(reference) = VideoReference::classify(&cmd.reference) else {
        return output.error("Reference must not be empty", ExitCode::InvalidArgs);
    };

    let result = ClassifyResult {
        file_path: reference.file_path(),
        position_identity: reference.position_identity(),
        request: reference.stream_request(),
        identity: reference.identity,
        kind: reference.kind,
    };

    let line = format!("{}: {}", result.kind, result.file_path);
    match output.print_line(line, &result) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Positions Command
// =============================================================================

#[derive(Debug, Serialize)]
struct PositionEntry {
    video_identity: String,
    offset_seconds: f64,
    saved_at_epoch_ms: i64,
    clock: String,
}

impl From<PlaybackPosition> for PositionEntry {
    fn from(p: PlaybackPosition) -> Self {
        Self {
            clock: format_clock(p.offset_seconds),
            video_identity: p.video_identity,
            offset_seconds: p.offset_seconds,
            saved_at_epoch_ms: p.saved_at_epoch_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct PurgeResult {
    removed: usize,
}

pub async fn positions_cmd(cmd: PositionsCmd, ctx: &Context, output: &Output) -> ExitCode {
    let Some(positions) = ctx.positions() else {
        return output.error(
            "Could not determine where positions are stored",
            ExitCode::StorageError,
        );
    };

    match cmd.action {
        PositionsAction::List => {
            let entries = positions.list();
            if output.json {
                let entries: Vec<PositionEntry> = entries.into_iter().map(Into::into).collect();
                if let Err(e) = output.print(&entries) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            } else if entries.is_empty() {
                output.info("No saved positions");
            } else {
                for entry in &entries {
                    println!("{}", entry);
                }
            }
            ExitCode::Success
        }

        PositionsAction::Get(arg) => {
            let Some(reference) = VideoReference::classify(&arg.reference) else {
                return output.error("Reference must not be empty", ExitCode::InvalidArgs);
            };
            let identity = reference.position_identity();
            match positions.get(&identity) {
                Some(position) => {
                    let entry = PositionEntry::from(position);
                    match output.print_line(&entry.clock, &entry) {
                        Ok(()) => ExitCode::Success,
                        Err(e) => {
                            output.error(format!("Failed to serialize: {}", e), ExitCode::Error)
                        }
                    }
                }
                None => output.error(
                    format!("No saved position for {}", identity),
                    ExitCode::NotFound,
                ),
            }
        }

        PositionsAction::Forget(arg) => {
            let Some(reference) = VideoReference::classify(&arg.reference) else {
                return output.error("Reference must not be empty", ExitCode::InvalidArgs);
            };
            let identity = reference.position_identity();
            if positions.load(&identity).is_none() {
                return output.error(
                    format!("No saved position for {}", identity),
                    ExitCode::NotFound,
                );
            }
            if !positions.forget(&identity) {
                return output.error(
                    format!("Failed to forget position for {}", identity),
                    ExitCode::StorageError,
                );
            }
            output.info(format!("Forgot position for {}", identity));
            if output.json {
                if let Err(e) = output.print(StatusOk::default()) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
            }
            ExitCode::Success
        }

        PositionsAction::Purge => {
            let result = PurgeResult {
                removed: positions.purge_expired(),
            };
            let line = format!("Removed {} stale position(s)", result.removed);
            match output.print_line(line, &result) {
                Ok(()) => ExitCode::Success,
                Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
            }
        }
    }
}

// =============================================================================
// Open External Command
// =============================================================================

pub async fn open_external_cmd(cmd: OpenExternalCmd, output: &Output) -> ExitCode {
    let Some(reference) = VideoReference::classify(&cmd.target) else {
        return output.error("Target must not be empty", ExitCode::InvalidArgs);
    };

    let host = SystemHost::new();
    let reply = if !reference.is_streamed() && is_web_url(&reference.identity) {
        host.open_external(&reference.identity).await
    } else {
        // Streams hand off the underlying file, not the transcoder URL
        host.open_path(&reference.file_path()).await
    };

    if !reply.success {
        let msg = reply
            .error
            .unwrap_or_else(|| "External player could not be started".to_string());
        return output.error(msg, ExitCode::OpenFailed);
    }

    output.info(format!("Opened externally: {}", reference.file_path()));
    if output.json {
        if let Err(e) = output.print(StatusOk::default()) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_port_overrides_config() {
        let ctx = Context {
            config: Config {
                stream_port: Some(9000),
                ..Default::default()
            },
            port: Some(9100),
        };
        assert_eq!(ctx.endpoint_url(), "http://127.0.0.1:9100");
    }

    #[test]
    fn test_position_lookup_reports_saved_time() {
        let dir = std::env::temp_dir().join(format!("shelfplay-cmd-{}", uuid::Uuid::new_v4()));
        let ctx = Context {
            config: Config {
                positions_file: Some(dir.join("positions.json")),
                ..Default::default()
            },
            port: None,
        };
        let positions = ctx.positions().unwrap();
        assert!(positions.save("/m/a.mkv", 90.0));

        let reference = VideoReference::classify("file:///m/a.mkv").unwrap();
        let entry = PositionEntry::from(positions.get(&reference.position_identity()).unwrap());
        assert_eq!(entry.video_identity, "/m/a.mkv");
        assert_eq!(entry.clock, "1:30");
        assert!(entry.saved_at_epoch_ms > 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_position_entry_has_clock() {
        let entry: PositionEntry = PlaybackPosition {
            video_identity: "/m/a.mkv".to_string(),
            offset_seconds: 3725.0,
            saved_at_epoch_ms: 1,
        }
        .into();
        assert_eq!(entry.clock, "1:02:05");
    }
}
