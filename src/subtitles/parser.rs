use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::error::GenerationError;
use crate::subtitles::model::{parse_timestamp, SubtitleRange};

/// Parser for the caption-track files written by the downloader (WebVTT).
///
/// YouTube tracks, auto-generated ones in particular, repeat captions across
/// consecutive display windows and wrap words in inline styling tags; both are
/// normalized away here so the optimizer and the clipper only ever see plain,
/// unique caption texts.
pub struct SubtitleParser {
    timing: Regex,
    markup: Regex,
}

impl SubtitleParser {
    pub fn new() -> Self {
        Self {
            // Cue settings after the end timestamp (align/position) are allowed.
            timing: Regex::new(r"(\d+:\d+:\d+\.\d+) --> (\d+:\d+:\d+\.\d+)")
                .unwrap(),
            markup: Regex::new(r"<[^>]*>").unwrap(),
        }
    }

    /// Parse a caption-track file into timed subtitle ranges.
    ///
    /// Fails only when the file contains no valid timed chunk at all.
    pub fn parse(&self, path: &Path) -> Result<Vec<SubtitleRange>, GenerationError> {
        let raw = std::fs::read_to_string(path)?;
        let subtitles = self.parse_str(&raw);
        if subtitles.is_empty() {
            return Err(GenerationError::MalformedSubtitleFile(path.to_path_buf()));
        }
        Ok(subtitles)
    }

    /// Parse raw caption-track text.
    ///
    /// Chunks are separated by blank lines; the leading WEBVTT header chunk is
    /// skipped and parsing stops at the first later chunk without a timing
    /// line (trailing metadata is not an error).
    pub fn parse_str(&self, raw: &str) -> Vec<SubtitleRange> {
        let text = raw.replace("\r\n", "\n");
        let mut seen: HashSet<String> = HashSet::new();
        let mut subtitles = Vec::new();

        for chunk in text.split("\n\n").skip(1) {
            let Some(caps) = self.timing.captures(chunk) else {
                break; // reached end of timed cues
            };
            let (Ok(start), Ok(end)) = (parse_timestamp(&caps[1]), parse_timestamp(&caps[2]))
            else {
                continue;
            };
            if start >= end {
                continue;
            }

            let body = chunk
                .lines()
                .skip_while(|line| !self.timing.is_match(line))
                .skip(1)
                .collect::<Vec<_>>()
                .join(" ");
            let cleaned = self.markup.replace_all(&body, "");
            let cleaned = cleaned.trim();

            if cleaned.is_empty() || seen.contains(cleaned) {
                continue;
            }
            seen.insert(cleaned.to_string());
            subtitles.push(SubtitleRange::new(cleaned, start, end));
        }

        subtitles
    }
}

impl Default for SubtitleParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HEADER: &str = "WEBVTT\nKind: captions\nLanguage: en";

    fn track(blocks: &[&str]) -> String {
        let mut parts = vec![HEADER.to_string()];
        parts.extend(blocks.iter().map(|b| b.to_string()));
        parts.join("\n\n")
    }

    #[test]
    fn test_parses_well_formed_blocks_in_order() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.049 --> 00:00:03.500\nWhat if doing well in school and in life",
            "00:00:03.500 --> 00:00:06.200\ndepends on much more than your ability",
            "00:00:06.200 --> 00:00:09.630\nto learn quickly and easily?",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].text, "What if doing well in school and in life");
        assert_eq!(subs[0].start, Duration::from_millis(49));
        assert_eq!(subs[2].end, Duration::from_millis(9630));
        assert!(subs.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn test_duplicate_texts_emitted_once() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.000 --> 00:00:02.000\nsame caption",
            "00:00:02.000 --> 00:00:04.000\nsame caption",
            "00:00:04.000 --> 00:00:06.000\ndifferent caption",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].text, "same caption");
        assert_eq!(subs[1].text, "different caption");
    }

    #[test]
    fn test_strips_inline_markup() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.000 --> 00:00:02.000\nplain <c>styled</c> and<00:00:01.000><c> timed</c>",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs[0].text, "plain styled and timed");
    }

    #[test]
    fn test_multi_line_text_joined_with_spaces() {
        let parser = SubtitleParser::new();
        let raw = track(&["00:00:00.000 --> 00:00:02.000\nfirst line\nsecond line"]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs[0].text, "first line second line");
    }

    #[test]
    fn test_cue_settings_after_end_timestamp_allowed() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.000 --> 00:00:02.000 align:start position:0%\nsettings ignored",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "settings ignored");
    }

    #[test]
    fn test_trailing_metadata_stops_parsing() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.000 --> 00:00:02.000\nreal caption",
            "NOTE some trailing metadata",
            "00:00:04.000 --> 00:00:06.000\nnever reached",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "real caption");
    }

    #[test]
    fn test_empty_and_inverted_captions_dropped() {
        let parser = SubtitleParser::new();
        let raw = track(&[
            "00:00:00.000 --> 00:00:02.000\n<c></c>",
            "00:00:05.000 --> 00:00:03.000\ntime runs backwards",
            "00:00:06.000 --> 00:00:08.000\nkept",
        ]);

        let subs = parser.parse_str(&raw);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "kept");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let parser = SubtitleParser::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.vtt");
        std::fs::write(&path, "WEBVTT\n\nnothing timed in here\n").unwrap();

        let result = parser.parse(&path);
        assert!(matches!(
            result,
            Err(GenerationError::MalformedSubtitleFile(_))
        ));
    }

    #[test]
    fn test_crlf_input() {
        let parser = SubtitleParser::new();
        let raw = "WEBVTT\r\n\r\n00:00:00.000 --> 00:00:02.000\r\nwindows line endings\r\n";

        let subs = parser.parse_str(raw);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].text, "windows line endings");
    }
}
