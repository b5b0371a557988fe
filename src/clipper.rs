use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::GenerationError;
use crate::subtitles::model::{format_seconds, format_timestamp, SubtitleRange};
use crate::task::Dimensions;

/// Media files produced for one subtitle's time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedMedia {
    pub picture_path: PathBuf,
    pub audio_path: PathBuf,
}

/// One finished card: a subtitle paired with the media clipped for it,
/// combined at emission time.
#[derive(Debug, Clone)]
pub struct CardMaterial {
    pub subtitle: SubtitleRange,
    pub media: ClippedMedia,
}

/// Per-subtitle media extraction. A failure is per-item and never aborts the
/// surrounding pipeline run.
#[async_trait]
pub trait Clipper: Send + Sync {
    async fn clip(
        &self,
        subtitle: &SubtitleRange,
        video_path: &Path,
        video_title: &str,
        dimensions: Dimensions,
    ) -> Result<ClippedMedia, GenerationError>;
}

/// Extracts a still frame and an audio slice per subtitle via ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegClipper {
    ffmpeg: String,
    output_dir: PathBuf,
}

impl FfmpegClipper {
    pub fn new(ffmpeg: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Output-file stem derived from the title plus the subtitle's start and
    /// duration, so clips of distinct subtitles of one run never collide.
    fn media_stem(video_title: &str, subtitle: &SubtitleRange) -> String {
        sanitize_filename(&format!(
            "{}_{}_{}",
            video_title,
            format_timestamp(subtitle.start),
            format_seconds(subtitle.duration()),
        ))
    }

    async fn run_ffmpeg(&self, args: &[&str], output: &Path) -> Result<(), GenerationError> {
        // loglevel quiet plus captured stdio: the only signal is the exit
        // status and the presence of the output file.
        let result = Command::new(&self.ffmpeg)
            .args(args)
            .output()
            .await
            .map_err(|e| GenerationError::ClipExtractionFailed(format!("{}: {}", self.ffmpeg, e)))?;

        if !result.status.success() {
            return Err(GenerationError::ClipExtractionFailed(format!(
                "{} exited with {} for {}",
                self.ffmpeg,
                result.status,
                output.display()
            )));
        }
        if !output.exists() {
            return Err(GenerationError::ClipExtractionFailed(format!(
                "no output file produced at {}",
                output.display()
            )));
        }
        Ok(())
    }

    /// Seek to the subtitle start and emit exactly one frame at fixed quality.
    async fn extract_frame(
        &self,
        subtitle: &SubtitleRange,
        video_path: &Path,
        dimensions: Dimensions,
        picture_path: &Path,
    ) -> Result<(), GenerationError> {
        let start = format_timestamp(subtitle.start);
        let size = dimensions.to_string();
        self.run_ffmpeg(
            &[
                "-y",
                "-ss",
                &start,
                "-i",
                &video_path.to_string_lossy(),
                "-s",
                &size,
                "-vframes",
                "1",
                "-q:v",
                "2",
                "-loglevel",
                "quiet",
                &picture_path.to_string_lossy(),
            ],
            picture_path,
        )
        .await
    }

    /// Seek to the subtitle start and slice out exactly its duration of audio.
    async fn extract_audio(
        &self,
        subtitle: &SubtitleRange,
        video_path: &Path,
        audio_path: &Path,
    ) -> Result<(), GenerationError> {
        let start = format_timestamp(subtitle.start);
        let duration = format_seconds(subtitle.duration());
        self.run_ffmpeg(
            &[
                "-y",
                "-ss",
                &start,
                "-i",
                &video_path.to_string_lossy(),
                "-t",
                &duration,
                "-vn",
                "-loglevel",
                "quiet",
                &audio_path.to_string_lossy(),
            ],
            audio_path,
        )
        .await
    }
}

#[async_trait]
impl Clipper for FfmpegClipper {
    async fn clip(
        &self,
        subtitle: &SubtitleRange,
        video_path: &Path,
        video_title: &str,
        dimensions: Dimensions,
    ) -> Result<ClippedMedia, GenerationError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let stem = Self::media_stem(video_title, subtitle);
        let picture_path = self.output_dir.join(format!("{stem}.jpeg"));
        let audio_path = self.output_dir.join(format!("{stem}.mp3"));

        debug!(
            "clipping [{} - {}] -> {}",
            format_timestamp(subtitle.start),
            format_timestamp(subtitle.end),
            stem
        );

        self.extract_frame(subtitle, video_path, dimensions, &picture_path)
            .await?;
        self.extract_audio(subtitle, video_path, &audio_path).await?;

        Ok(ClippedMedia {
            picture_path,
            audio_path,
        })
    }
}

/// Replace characters unsafe for filenames; timestamps contribute ':' and '.'
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_media_stem_is_filename_safe() {
        let subtitle = SubtitleRange::new(
            "irrelevant",
            Duration::from_millis(49),
            Duration::from_millis(9630),
        );
        let stem = FfmpegClipper::media_stem("Grit: The Power / of Perseverance - en", &subtitle);

        assert!(!stem.contains(':'));
        assert!(!stem.contains('/'));
        assert!(!stem.contains(' '));
        assert!(!stem.contains('.'));
        assert!(stem.starts_with("Grit"));
    }

    #[test]
    fn test_media_stem_distinguishes_subtitles() {
        let a = SubtitleRange::new("a", Duration::from_millis(49), Duration::from_millis(9630));
        let b = SubtitleRange::new("b", Duration::from_millis(9630), Duration::from_millis(20259));

        assert_ne!(
            FfmpegClipper::media_stem("title", &a),
            FfmpegClipper::media_stem("title", &b)
        );
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_a_clip_error() {
        let clipper = FfmpegClipper::new("ffmpeg-binary-that-does-not-exist", std::env::temp_dir());
        let subtitle =
            SubtitleRange::new("text", Duration::from_secs(1), Duration::from_secs(2));

        let result = clipper
            .clip(
                &subtitle,
                Path::new("/nonexistent/video.mp4"),
                "title",
                Dimensions {
                    width: 240,
                    height: 160,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(GenerationError::ClipExtractionFailed(_))
        ));
    }
}
