//! Host window-manager capabilities
//!
//! The desktop shell owns the window and the OS integration. The playback
//! session reaches it through [`HostWindow`]: read and toggle the fullscreen
//! flag, and hand a file or URL to the system so an external player can take
//! over when the built-in one gives up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;

/// Reply to a fullscreen query or toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReply {
    pub success: bool,
    pub is_full_screen: bool,
}

impl HostReply {
    pub fn ok(is_full_screen: bool) -> Self {
        Self {
            success: true,
            is_full_screen,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

/// Reply to an open request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReply {
    pub success: bool,
    pub error: Option<String>,
}

impl OpenReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Window-manager capabilities the session consumes
#[async_trait]
pub trait HostWindow: Send + Sync {
    async fn is_fullscreen(&self) -> HostReply;
    async fn toggle_fullscreen(&self) -> HostReply;
    /// Open a local file with the system's default application
    async fn open_path(&self, path: &str) -> OpenReply;
    /// Open a URL with the system's default handler
    async fn open_external(&self, url: &str) -> OpenReply;
}

// =============================================================================
// System host
// =============================================================================

/// Host backed by the OS opener command.
///
/// There is no real window here, so the fullscreen flag is an in-process
/// value flipped by `toggle_fullscreen`.
#[derive(Debug, Default)]
pub struct SystemHost {
    fullscreen: AtomicBool,
}

impl SystemHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command used to hand files and URLs to the desktop
    pub fn opener() -> (&'static str, &'static [&'static str]) {
        #[cfg(target_os = "macos")]
        {
            ("open", &[])
        }
        #[cfg(target_os = "windows")]
        {
            ("cmd", &["/C", "start", ""])
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            ("xdg-open", &[])
        }
    }

    async fn spawn_opener(&self, target: &str) -> OpenReply {
        let (program, args) = Self::opener();
        let result = Command::new(program)
            .args(args)
            .arg(target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match result {
            Ok(_) => {
                tracing::info!(opened = %target, "handed off to system opener");
                OpenReply::ok()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                OpenReply::failed(format!("Opener '{}' not found", program))
            }
            Err(e) => OpenReply::failed(format!("Failed to start opener: {}", e)),
        }
    }
}

#[async_trait]
impl HostWindow for SystemHost {
    async fn is_fullscreen(&self) -> HostReply {
        HostReply::ok(self.fullscreen.load(Ordering::SeqCst))
    }

    async fn toggle_fullscreen(&self) -> HostReply {
        let now = !self.fullscreen.fetch_xor(true, Ordering::SeqCst);
        HostReply::ok(now)
    }

    async fn open_path(&self, path: &str) -> OpenReply {
        if !std::path::Path::new(path).exists() {
            return OpenReply::failed(format!("File not found: {}", path));
        }
        self.spawn_opener(path).await
    }

    async fn open_external(&self, url: &str) -> OpenReply {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return OpenReply::failed(format!("Refusing to open non-web URL: {}", url));
        }
        self.spawn_opener(url).await
    }
}
