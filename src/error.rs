//! Library error type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building the runtime from a map description or
/// loading engine configuration.
///
/// Runtime queries never return these: out-of-range coordinates and
/// unresolved tiles come back as `None` instead.
#[derive(Debug, Error)]
pub enum MapError {
    /// A file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Configuration JSON did not parse.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The map description is inconsistent.
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// A layer's cell array does not match its size.
    #[error("layer '{layer}' holds {actual} cells, expected {expected}")]
    InvalidLayerSize {
        /// Layer name.
        layer: String,
        /// Width times height.
        expected: usize,
        /// Cells provided.
        actual: usize,
    },

    /// Two tilesets claim the same first gid.
    #[error("two tilesets start at gid {first_gid}")]
    DuplicateTileset {
        /// The contested gid.
        first_gid: u32,
    },
}
