//! Error types for Percept.

use thiserror::Error;

/// Result type alias using Percept's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Percept operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Sentinel for a worker that produced no output without failing.
    ///
    /// Runners recognise this value, drop the item, and never forward it to
    /// the chain's error sink.
    #[error("skipped item")]
    SkippedItem,

    /// An item transform failed; the item is dropped and the error is
    /// reported on the chain's error sink.
    #[error("transform failed: {0}")]
    Transform(String),

    /// A codec-server method was called in the wrong output mode.
    #[error("exiftool protocol misuse: {0}")]
    Protocol(&'static str),

    /// The external tool reported an error on stderr.
    #[error("exiftool: {0}")]
    ExifTool(String),

    /// The codec server has already been shut down or closed.
    #[error("exiftool server closed")]
    Closed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
