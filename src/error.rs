use std::path::PathBuf;

/// Ways a single fetch can fail. All of them are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("response body was empty")]
    EmptyBody,

    #[error("could not decode image: {0}")]
    Decode(String),

    /// The transfer was abandoned because its cancel token fired.
    #[error("fetch cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("no image to save")]
    NoImage,

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("no image to copy")]
    NoImage,

    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
}
