//! Long-lived ExifTool coprocess driver.
//!
//! Operating ExifTool in `-stay_open` mode trades the per-command process
//! startup cost for steady-state throughput: one child process serves many
//! commands over stdin/stdout, with responses delimited by a fixed
//! ready-marker the tool is instructed to echo after each command.
//!
//! Two output modes are supported, selected at construction:
//!
//! - **Buffered** ([`Server::new`]): one [`Server::command`] call returns
//!   the command's whole stdout as one byte blob.
//! - **Streamed** ([`Server::with_output`]): the stdout between
//!   ready-markers is fragmented into per-object tokens
//!   (see [`splitter`]) and forwarded on a channel as they appear.
//!
//! The driver is safe for concurrent callers and restarts the child on any
//! I/O failure during dispatch. It does not observe cancellation scopes;
//! shut it down explicitly with [`Server::shutdown`] or [`Server::close`].

mod server;
pub mod splitter;

pub use server::Server;

use std::path::PathBuf;

/// Numeric substring shared by the ready-marker and the execute directive.
pub const BOUNDARY: &str = "1854673209";

/// Sentinel echoed by the tool after each command on stdout and stderr.
pub const READY_MARKER: &str = concat!("{ready", "1854673209", "}");

/// Per-command terminator line written to the child's stdin.
pub(crate) const EXECUTE: &str = concat!("-execute", "1854673209");

/// Location of the ExifTool executable, resolved before start.
///
/// The default differs between operating systems; no environment variables
/// are consulted and nothing is persisted.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the executable.
    pub exec: PathBuf,
    /// Optional first argument placed before everything else
    /// (the Perl distribution directory on Windows).
    pub arg1: Option<String>,
    /// Optional `-config` file path.
    pub config_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                exec: PathBuf::from(r"dist\exiftool.exe"),
                arg1: Some(r"dist\exiftool".to_string()),
                config_file: None,
            }
        } else {
            Self {
                exec: PathBuf::from("dist/exiftool"),
                arg1: None,
                config_file: None,
            }
        }
    }
}

impl ServerConfig {
    /// Config pointing at a specific executable, with no extra arguments.
    pub fn with_exec(exec: impl Into<PathBuf>) -> Self {
        Self {
            exec: exec.into(),
            arg1: None,
            config_file: None,
        }
    }
}
