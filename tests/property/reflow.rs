//! Property-based tests for long-line reflow.
//!
//! Uses proptest to verify, for any text and width:
//! 1. The number of display lines is `ceil(len / width)`.
//! 2. No display line exceeds `width` plus the break marker.
//! 3. Stripping the break markers gives back the original text.
//! 4. Hyphens appear exactly where a cut splits a word.

use chatline::format::{fit_to_width, reflow};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z ]{1,400}"
}

proptest! {
    #[test]
    fn line_count_matches_chunking(text in arb_text(), width in 1usize..=80) {
        let len = text.chars().count();
        let out = reflow(&text, width);
        let lines = out.split('\n').count();
        prop_assert_eq!(lines, len.div_ceil(width));
    }

    #[test]
    fn lines_stay_within_width(text in arb_text(), width in 1usize..=80) {
        let out = reflow(&text, width);
        for line in out.split('\n') {
            prop_assert!(line.chars().count() <= width + 4, "line too long: {:?}", line);
        }
    }

    #[test]
    fn markers_strip_back_to_original(text in arb_text(), width in 1usize..=80) {
        let out = reflow(&text, width);
        let lines: Vec<&str> = out.split('\n').collect();
        let (last, body) = lines.split_last().unwrap();

        let mut rebuilt: String = body
            .iter()
            .flat_map(|line| line.chars().take(width))
            .collect();
        rebuilt.push_str(last);
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn hyphen_marks_split_words(text in arb_text(), width in 1usize..=80) {
        let chars: Vec<char> = text.chars().collect();
        let out = reflow(&text, width);
        let lines: Vec<&str> = out.split('\n').collect();

        for (i, line) in lines.iter().enumerate().take(lines.len() - 1) {
            let cut = (i + 1) * width;
            let splits_word = chars[cut - 1] != ' ' && chars[cut] != ' ';
            let marker: String = line.chars().skip(width).collect();
            if splits_word {
                prop_assert_eq!(marker, "-");
            } else {
                prop_assert_eq!(marker, "    ");
            }
        }
    }

    #[test]
    fn fit_to_width_leaves_short_text_alone(text in arb_text(), width in 1usize..=400) {
        let out = fit_to_width(&text, width);
        if text.chars().count() <= width {
            prop_assert_eq!(out, text);
        } else {
            prop_assert!(out.contains('\n'));
        }
    }
}
