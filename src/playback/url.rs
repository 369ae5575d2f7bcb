//! Stream URL construction
//!
//! Pure helpers that derive the next streaming request from the current one.
//! Nothing here touches the network or the clock.

use crate::models::StreamRequest;

/// A seek closer than this to the encoded start is served by native seeking
pub const REISSUE_THRESHOLD_SECONDS: f64 = 2.0;

/// Changes to apply on top of the current request.
///
/// `start: None` keeps the current start. Track fields are the full desired
/// state: `None` removes the parameter, which means "endpoint default" and is
/// distinct from track 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamOverrides {
    pub start: Option<f64>,
    pub audio: Option<u32>,
    pub subtitle: Option<u32>,
}

/// Derive a request from the current parameters and overrides
pub fn build_request(
    endpoint: &str,
    file_path: &str,
    current: Option<&StreamRequest>,
    overrides: StreamOverrides,
) -> StreamRequest {
    let start = overrides
        .start
        .map(clamp_start)
        .or_else(|| current.and_then(|c| c.start_offset_seconds));

    StreamRequest {
        endpoint: endpoint.trim_end_matches('/').to_string(),
        file_path: file_path.to_string(),
        start_offset_seconds: start,
        audio_global_index: overrides.audio,
        subtitle_global_index: overrides.subtitle,
        extra: current.map(|c| c.extra.clone()).unwrap_or_default(),
    }
}

/// Serialized form of [`build_request`]
pub fn build(
    endpoint: &str,
    file_path: &str,
    current: Option<&StreamRequest>,
    overrides: StreamOverrides,
) -> String {
    build_request(endpoint, file_path, current, overrides).to_url()
}

/// Whether a seek to `requested_start` warrants a new stream
pub fn needs_reissue(current_start: f64, requested_start: f64) -> bool {
    (requested_start - current_start).abs() > REISSUE_THRESHOLD_SECONDS
}

fn clamp_start(start: f64) -> f64 {
    if start.is_finite() && start > 0.0 {
        start
    } else {
        0.0
    }
}
