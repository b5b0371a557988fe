use std::path::PathBuf;
use thiserror::Error;

/// Domain errors of the generation pipeline.
///
/// Only `NoSubtitlesAvailable`, downloader failures and
/// `CollectionWriteFailed` abort a run; `MalformedSubtitleFile` degrades the
/// run to zero cards and `ClipExtractionFailed` is absorbed per subtitle.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no man-made subtitles found for the requested language and fallback to auto-generated captions is disabled")]
    NoSubtitlesAvailable,

    #[error("malformed subtitle file (no timed caption blocks): {}", .0.display())]
    MalformedSubtitleFile(PathBuf),

    #[error("clip extraction failed: {0}")]
    ClipExtractionFailed(String),

    #[error("collection write failed: {0}")]
    CollectionWriteFailed(String),

    #[error("downloader failed: {0}")]
    DownloadFailed(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("fields configuration invalid: {0}")]
    InvalidFieldsConfiguration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
