use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::GenerationError;

/// Maps the three card roles onto named fields of the host's note schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfiguration {
    /// Note type (model) name in the collection
    pub note_type: String,
    /// Destination field for the sentence text
    pub text_field: String,
    /// Destination field for the audio clip reference
    pub audio_field: String,
    /// Destination field for the still-frame reference
    pub picture_field: String,
}

impl FieldsConfiguration {
    /// The three destination fields must be pairwise distinct; checked before
    /// a run starts.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.text_field == self.audio_field
            || self.text_field == self.picture_field
            || self.audio_field == self.picture_field
        {
            return Err(GenerationError::InvalidFieldsConfiguration(
                "text, audio and picture fields must all be different".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output dimensions of the extracted still frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        Ok(Self {
            width: w.trim().parse().map_err(|_| format!("invalid width '{w}'"))?,
            height: h.trim().parse().map_err(|_| format!("invalid height '{h}'"))?,
        })
    }
}

/// One whole generation job; immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct GenerateVideoTask {
    /// Source video URL (or opaque downloader identifier)
    pub youtube_video_url: String,
    /// Subtitle language code requested from the downloader
    pub language: String,
    /// Substitute auto-generated captions when no manual track exists
    pub fallback: bool,
    /// Merge raw captions into sentence-sized units before clipping
    pub optimize_by_punctuation: bool,
    /// Still-frame output dimensions
    pub dimensions: Dimensions,
    /// Maximum number of cards to produce (0 = unlimited)
    pub limit: usize,
    /// Directory the clipped media files are written to
    pub output_dir: PathBuf,
    /// Card-role to note-field mapping
    pub fields: FieldsConfiguration,
}

/// Truncate the subtitle list to the task's result-count limit (0 = unlimited)
pub fn with_limit<T>(items: Vec<T>, limit: usize) -> Vec<T> {
    if limit == 0 {
        return items;
    }
    items.into_iter().take(limit).collect()
}
