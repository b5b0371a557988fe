/// YouTube to Anki - Rust Implementation
///
/// Turns a single online video into a deck of flashcards: one card per spoken
/// sentence, pairing the sentence text with a still frame and an audio clip
/// cut from the video at the moment the sentence was spoken.

pub mod clipper;
pub mod collection;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod subtitles;
pub mod task;
pub mod youtube;

// Re-export main types for easy access
pub use crate::clipper::{CardMaterial, ClippedMedia, Clipper, FfmpegClipper};
pub use crate::collection::{AnkiConnectStore, CardStore, DeckRef};
pub use crate::config::Config;
pub use crate::error::GenerationError;
pub use crate::pipeline::{
    CancellationToken, GenerationEvent, GenerationPipeline, PipelineHandle,
};
pub use crate::subtitles::{SubtitleOptimizer, SubtitleParser, SubtitleRange};
pub use crate::task::{Dimensions, FieldsConfiguration, GenerateVideoTask};
pub use crate::youtube::{DownloadedSources, VideoSource, YouTubeClient};
