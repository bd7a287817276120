use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to the remote photo source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Missing or rejected credentials.
    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Album enumeration failed; the caller decides the fallback.
    #[error("photo source unavailable for album {album_id}")]
    SourceUnavailable {
        album_id: String,
        #[source]
        source: SourceError,
    },

    /// A single item could not be downloaded. Absorbed inside `refresh`.
    #[error("failed to fetch item {index} from {url}")]
    FetchFailed {
        index: usize,
        url: String,
        #[source]
        source: SourceError,
    },

    #[error("cache I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unrecognized control command: {0:?}")]
    InvalidCommand(String),
}

#[derive(Debug, Error)]
pub enum SlideshowError {
    /// Neither the source nor the on-disk cache produced any media.
    #[error("no media available from the album or the local cache")]
    EmptyPlaylist,
}
