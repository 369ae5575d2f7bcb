//! CLI - Command Line Interface for shelfplay
//!
//! Scriptable access to the pieces of a playback session that do not need a
//! window: track inspection, stream URL construction, reference
//! classification, stored resume positions and the external-player hand-off.
//! All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # What audio tracks does this file have?
//! shelfplay tracks /movies/akira.mkv --json
//!
//! # Build the stream URL for track 2 starting at 2 minutes
//! shelfplay url /movies/akira.mkv --start 120 --audio 2
//!
//! # Where did I stop?
//! shelfplay positions list
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Streaming endpoint unreachable or returned an error
    EndpointError = 3,
    /// Nothing stored for the requested reference
    NotFound = 4,
    /// Position store could not be opened
    StorageError = 5,
    /// External hand-off failed
    OpenFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// shelfplay - local video playback for your media shelf
#[derive(Parser, Debug)]
#[command(
    name = "shelfplay",
    version,
    author = "Gorka & Hermes",
    about = "Local video playback for your media shelf",
    long_about = "Inspect tracks, build streaming URLs, and manage resume \
                  positions for the local playback session.",
    after_help = "EXAMPLES:\n\
                  shelfplay tracks /movies/a.mkv            List audio/subtitle tracks\n\
                  shelfplay url /movies/a.mkv --start 90    Build a stream URL\n\
                  shelfplay positions list --json           Show resume positions\n\
                  shelfplay open-external /movies/a.mkv     Play in the system player"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Streaming endpoint port (overrides config)
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the audio and subtitle tracks of a file
    #[command(visible_alias = "t")]
    Tracks(TracksCmd),

    /// Build a streaming URL for a file
    Url(UrlCmd),

    /// Classify a video reference as direct or streamed
    #[command(visible_alias = "cl")]
    Classify(ClassifyCmd),

    /// Manage stored resume positions
    #[command(visible_alias = "pos")]
    Positions(PositionsCmd),

    /// Hand a file or URL to the system's default player
    #[command(visible_alias = "ext")]
    OpenExternal(OpenExternalCmd),
}

/// List tracks reported by the streaming endpoint
#[derive(Args, Debug)]
pub struct TracksCmd {
    /// Path of the video file
    #[arg(required = true)]
    pub file: String,
}

/// Build a streaming URL
#[derive(Args, Debug)]
pub struct UrlCmd {
    /// Path of the video file
    #[arg(required = true)]
    pub file: String,

    /// Start offset in seconds
    #[arg(long, short = 's')]
    pub start: Option<f64>,

    /// Audio track global index
    #[arg(long, short = 'a')]
    pub audio: Option<u32>,

    /// Subtitle track global index (the transcoder ignores it)
    #[arg(long)]
    pub subtitle: Option<u32>,
}

/// Classify a reference
#[derive(Args, Debug)]
pub struct ClassifyCmd {
    /// File path or URL
    #[arg(required = true)]
    pub reference: String,
}

/// Resume position management
#[derive(Args, Debug)]
pub struct PositionsCmd {
    #[command(subcommand)]
    pub action: PositionsAction,
}

#[derive(Subcommand, Debug)]
pub enum PositionsAction {
    /// List all valid positions, most recent first
    #[command(visible_alias = "ls")]
    List,
    /// Show the resume offset of one reference
    Get(PositionRefArg),
    /// Forget the position of one reference
    #[command(visible_alias = "rm")]
    Forget(PositionRefArg),
    /// Remove expired and malformed entries
    Purge,
}

#[derive(Args, Debug)]
pub struct PositionRefArg {
    /// File path or stream URL
    #[arg(required = true)]
    pub reference: String,
}

/// External hand-off
#[derive(Args, Debug)]
pub struct OpenExternalCmd {
    /// File path, stream URL or web URL
    #[arg(required = true)]
    pub target: String,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOk {
    pub status: &'static str,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print a plain line in human mode, wrapped data in JSON mode
    pub fn print_line<T: Serialize>(&self, line: impl std::fmt::Display, data: T) -> anyhow::Result<()> {
        if self.json {
            self.print(data)
        } else {
            println!("{}", line);
            Ok(())
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verify CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_url_command() {
        let cli = Cli::parse_from([
            "shelfplay",
            "url",
            "/movies/a.mkv",
            "--start",
            "42.3",
            "-a",
            "2",
        ]);
        if let Command::Url(cmd) = cli.command {
            assert_eq!(cmd.file, "/movies/a.mkv");
            assert_eq!(cmd.start, Some(42.3));
            assert_eq!(cmd.audio, Some(2));
            assert_eq!(cmd.subtitle, None);
        } else {
            panic!("Expected Url command");
        }
    }

    #[test]
    fn test_positions_subcommands() {
        let cli = Cli::parse_from(["shelfplay", "pos", "get", "/movies/a.mkv", "--json"]);
        assert!(cli.json);
        match cli.command {
            Command::Positions(PositionsCmd {
                action: PositionsAction::Get(arg),
            }) => assert_eq!(arg.reference, "/movies/a.mkv"),
            other => panic!("Expected positions get, got {:?}", other),
        }

        let cli = Cli::parse_from(["shelfplay", "positions", "purge"]);
        assert!(matches!(
            cli.command,
            Command::Positions(PositionsCmd {
                action: PositionsAction::Purge
            })
        ));
    }

    #[test]
    fn test_global_port_flag() {
        let cli = Cli::parse_from(["shelfplay", "tracks", "/m/a.mkv", "-p", "9001"]);
        assert_eq!(cli.port, Some(9001));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Error), 1);
        assert_eq!(i32::from(ExitCode::InvalidArgs), 2);
        assert_eq!(i32::from(ExitCode::EndpointError), 3);
        assert_eq!(i32::from(ExitCode::NotFound), 4);
        assert_eq!(i32::from(ExitCode::StorageError), 5);
        assert_eq!(i32::from(ExitCode::OpenFailed), 6);
    }

    #[test]
    fn test_json_output_shapes() {
        let ok = serde_json::to_value(JsonOutput::success(StatusOk::default())).unwrap();
        assert_eq!(ok["data"]["status"], "ok");
        assert!(ok.get("exit_code").is_none());

        let err = serde_json::to_value(JsonOutput::<()>::error_msg("boom", ExitCode::NotFound))
            .unwrap();
        assert_eq!(err["error"], "boom");
        assert_eq!(err["exit_code"], 4);
    }
}
