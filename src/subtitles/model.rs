use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GenerationError;

/// One timed caption (or, after optimization, one merged sentence).
///
/// Timestamps are relative to the start of the video. The value is immutable;
/// media produced for it lives in a separate [`crate::clipper::ClippedMedia`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRange {
    /// Normalized caption text (markup stripped, no embedded newlines)
    pub text: String,
    /// Start timestamp
    pub start: Duration,
    /// End timestamp
    pub end: Duration,
}

impl SubtitleRange {
    /// Create a new subtitle range with trimmed text
    pub fn new(text: impl Into<String>, start: Duration, end: Duration) -> Self {
        Self {
            text: text.into().trim().to_string(),
            start,
            end,
        }
    }

    /// Display span of the caption
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Format a duration as a caption-track timestamp (HH:MM:SS.mmm)
pub fn format_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let milliseconds = duration.subsec_millis();

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
}

/// Parse a caption-track timestamp (HH:MM:SS.mmm) into a duration
pub fn parse_timestamp(timestamp: &str) -> Result<Duration, GenerationError> {
    let invalid = || GenerationError::InvalidTimestamp(timestamp.to_string());

    let (hms, millis) = timestamp.split_once('.').ok_or_else(invalid)?;

    let hms_parts: Vec<&str> = hms.split(':').collect();
    if hms_parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = hms_parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = hms_parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = hms_parts[2].parse().map_err(|_| invalid())?;
    let milliseconds: u64 = millis.parse().map_err(|_| invalid())?;

    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    Ok(Duration::from_millis(total_seconds * 1000 + milliseconds))
}

/// Format a duration as fractional seconds for an ffmpeg `-t` argument
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_range_trims_text() {
        let sub = SubtitleRange::new(
            "  hello there  ",
            Duration::from_secs(1),
            Duration::from_secs(2),
        );
        assert_eq!(sub.text, "hello there");
        assert_eq!(sub.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let cases = ["00:00:00.049", "00:01:08.760", "01:01:01.000", "10:59:59.999"];
        for case in cases {
            let parsed = parse_timestamp(case).unwrap();
            assert_eq!(format_timestamp(parsed), case);
        }
    }

    #[test]
    fn test_parse_timestamp_values() {
        assert_eq!(
            parse_timestamp("00:00:09.630").unwrap(),
            Duration::from_millis(9630)
        );
        assert_eq!(
            parse_timestamp("00:01:21.640").unwrap(),
            Duration::from_millis(81640)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not a timestamp").is_err());
        assert!(parse_timestamp("00:00:09").is_err());
        assert!(parse_timestamp("9.630").is_err());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_millis(3430)), "3.430");
        assert_eq!(format_seconds(Duration::from_secs(10)), "10.000");
    }
}
