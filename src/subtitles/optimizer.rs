use crate::subtitles::model::SubtitleRange;

/// Merges consecutive raw captions into sentence-sized units.
///
/// Raw caption tracks segment text by display-line width, so one caption is
/// usually a sentence fragment. Captions are accumulated until the combined
/// text ends with terminal punctuation, which closes the unit; an unterminated
/// tail is emitted as-is.
pub struct SubtitleOptimizer;

impl SubtitleOptimizer {
    /// Coalesce captions into sentence-terminated units.
    ///
    /// Lists shorter than two elements are returned unchanged. Re-running the
    /// pass on its own output is a fixed point: closed units stay singletons.
    pub fn optimize(subtitles: Vec<SubtitleRange>) -> Vec<SubtitleRange> {
        if subtitles.len() < 2 {
            return subtitles;
        }

        let mut optimized: Vec<SubtitleRange> = Vec::new();
        let mut open = false;

        for subtitle in subtitles {
            let text = subtitle.text.trim();
            match optimized.last_mut() {
                // Extend the open accumulator at the tail of the output list.
                Some(current) if open => {
                    current.end = subtitle.end;
                    current.text.push(' ');
                    current.text.push_str(text);
                }
                _ => {
                    optimized.push(SubtitleRange::new(text, subtitle.start, subtitle.end));
                    open = true;
                }
            }

            if optimized.last().is_some_and(|current| ends_sentence(&current.text)) {
                open = false;
            }
        }

        optimized
    }
}

fn ends_sentence(text: &str) -> bool {
    text.ends_with('.') || text.ends_with('?') || text.ends_with("?\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sub(text: &str, start_ms: u64, end_ms: u64) -> SubtitleRange {
        SubtitleRange::new(
            text,
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
        )
    }

    #[test]
    fn test_empty_list_unchanged() {
        assert_eq!(SubtitleOptimizer::optimize(Vec::new()), Vec::new());
    }

    #[test]
    fn test_singleton_unchanged() {
        let input = vec![sub("a fragment without punctuation", 0, 1000)];
        assert_eq!(SubtitleOptimizer::optimize(input.clone()), input);
    }

    #[test]
    fn test_three_fragments_merge_into_one_sentence() {
        let input = vec![
            sub("What if doing well in school and in life", 49, 3500),
            sub("depends on much more than your ability", 3500, 6200),
            sub("to learn quickly and easily?", 6200, 9630),
        ];

        let optimized = SubtitleOptimizer::optimize(input);
        assert_eq!(optimized.len(), 1);
        assert_eq!(optimized[0].start, Duration::from_millis(49));
        assert_eq!(optimized[0].end, Duration::from_millis(9630));
        assert_eq!(
            optimized[0].text,
            "What if doing well in school and in life depends on much more \
             than your ability to learn quickly and easily?"
        );
    }

    #[test]
    fn test_terminal_punctuation_variants_close_a_unit() {
        let input = vec![
            sub("First sentence.", 0, 1000),
            sub("Is this a question?", 1000, 2000),
            sub("\"A quoted one?\"", 2000, 3000),
            sub("trailing fragment", 3000, 4000),
        ];

        let optimized = SubtitleOptimizer::optimize(input);
        assert_eq!(optimized.len(), 4);
    }

    #[test]
    fn test_unterminated_tail_emitted_as_is() {
        let input = vec![
            sub("Done here.", 0, 1000),
            sub("this never", 1000, 2000),
            sub("gets its period", 2000, 3000),
        ];

        let optimized = SubtitleOptimizer::optimize(input);
        assert_eq!(optimized.len(), 2);
        assert_eq!(optimized[1].text, "this never gets its period");
        assert_eq!(optimized[1].start, Duration::from_millis(1000));
        assert_eq!(optimized[1].end, Duration::from_millis(3000));
    }

    #[test]
    fn test_fragments_trimmed_before_merging() {
        let input = vec![sub("  padded start ", 0, 1000), sub(" and end.  ", 1000, 2000)];

        let optimized = SubtitleOptimizer::optimize(input);
        assert_eq!(optimized.len(), 1);
        assert_eq!(optimized[0].text, "padded start and end.");
    }

    #[test]
    fn test_optimize_is_a_fixed_point_on_its_output() {
        let input = vec![
            sub("One sentence split", 0, 1000),
            sub("across fragments.", 1000, 2000),
            sub("Another one", 2000, 3000),
            sub("with a question?", 3000, 4000),
            sub("and an open tail", 4000, 5000),
        ];

        let once = SubtitleOptimizer::optimize(input);
        let twice = SubtitleOptimizer::optimize(once.clone());
        assert_eq!(once, twice);
    }
}
