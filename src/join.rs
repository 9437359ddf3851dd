//! Joining phrase tokens into a single prompt string and splitting it back.
//!
//! Every function here is pure. The active [`JoinMode`] is always passed in by
//! the caller; nothing in this module reads settings.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PUNCTUATION: [&str; 6] = [",", ".", "!", "?", ";", ":"];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;!?])").unwrap());
static REPEATED_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*,+").unwrap());
static SPACE_BEFORE_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+,").unwrap());
static SPACE_BEFORE_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\.").unwrap());

/// Separator and punctuation policy used when merging tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    Space,
    Comma,
    Sentence,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid join mode \"{input}\", expected one of: space, comma, sentence")]
pub struct InvalidJoinMode {
    pub input: String,
}

impl JoinMode {
    pub const ALL: [JoinMode; 3] = [JoinMode::Space, JoinMode::Comma, JoinMode::Sentence];

    pub fn as_str(self) -> &'static str {
        match self {
            JoinMode::Space => "space",
            JoinMode::Comma => "comma",
            JoinMode::Sentence => "sentence",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinMode {
    type Err = InvalidJoinMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "space" => Ok(JoinMode::Space),
            "comma" => Ok(JoinMode::Comma),
            "sentence" => Ok(JoinMode::Sentence),
            other => Err(InvalidJoinMode {
                input: other.to_string(),
            }),
        }
    }
}

/// Trim every token and drop the ones that end up empty, keeping order.
pub fn normalize_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| token.as_ref().trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the token is one of `, . ! ? ; :` once trimmed.
///
/// Rendering helper only; [`build_prompt`] applies its own per-mode filters.
pub fn is_punctuation_token(token: &str) -> bool {
    PUNCTUATION.contains(&token.trim())
}

/// Merge tokens into one prompt string according to `mode`.
///
/// Raw tokens are trimmed and empty ones dropped first, so
/// `build_prompt(&normalize_tokens(t), m) == build_prompt(t, m)`.
pub fn build_prompt<S: AsRef<str>>(tokens: &[S], mode: JoinMode) -> String {
    let cleaned = normalize_tokens(tokens);
    match mode {
        JoinMode::Space => join_space(&cleaned),
        JoinMode::Comma => join_comma(&cleaned),
        JoinMode::Sentence => join_sentence(&cleaned),
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

fn join_space(cleaned: &[String]) -> String {
    let text = collapse_whitespace(&cleaned.join(" "));
    SPACE_BEFORE_MARK.replace_all(&text, "$1").into_owned()
}

fn join_comma(cleaned: &[String]) -> String {
    // The separator supplies the commas, so standalone ones are dropped.
    let filtered: Vec<&str> = cleaned
        .iter()
        .map(String::as_str)
        .filter(|token| *token != ",")
        .collect();
    let text = filtered.join(", ");
    let text = REPEATED_COMMAS.replace_all(&text, ", ");
    let text = collapse_whitespace(&text);
    SPACE_BEFORE_COMMA.replace_all(&text, ",").into_owned()
}

fn join_sentence(cleaned: &[String]) -> String {
    let filtered: Vec<&str> = cleaned
        .iter()
        .map(String::as_str)
        .filter(|token| *token != ".")
        .map(|token| {
            if token.chars().count() > 1 {
                token.strip_suffix('.').unwrap_or(token)
            } else {
                token
            }
        })
        .collect();
    let text = collapse_whitespace(&filtered.join(". "));
    let mut text = SPACE_BEFORE_PERIOD.replace_all(&text, ".").into_owned();
    if !text.is_empty() && !text.ends_with('.') {
        text.push('.');
    }
    text
}

/// Split a prompt string back into tokens.
///
/// Only `comma` and `sentence` text is split, on `", "` and `". "`
/// respectively. Space-joined text comes back as a single token because the
/// separator also occurs inside multi-word phrases.
pub fn split_prompt(content: &str, mode: JoinMode) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match mode {
        JoinMode::Sentence => content
            .split(". ")
            .map(|piece| piece.strip_suffix('.').unwrap_or(piece).trim())
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect(),
        JoinMode::Comma => content
            .split(", ")
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect(),
        JoinMode::Space => vec![trimmed.to_string()],
    }
}

/// Token list for a stored prompt or history entry.
///
/// Stored tokens win; entries saved without them are split from `content`.
pub fn restore_tokens(content: &str, stored: &[String], mode: JoinMode) -> Vec<String> {
    let stored = normalize_tokens(stored);
    if stored.is_empty() {
        split_prompt(content, mode)
    } else {
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn space_joins_with_single_spaces() {
        let tokens = ["a beautiful girl", "sitting", "in a park"];
        assert_eq!(
            build_prompt(&tokens, JoinMode::Space),
            "a beautiful girl sitting in a park"
        );
    }

    #[test]
    fn space_removes_gap_before_punctuation() {
        let tokens = ["red hair", ",", "blue eyes"];
        assert_eq!(build_prompt(&tokens, JoinMode::Space), "red hair, blue eyes");
        assert_eq!(
            build_prompt(&["wow", "!", "really", "?"], JoinMode::Space),
            "wow! really?"
        );
    }

    #[test]
    fn space_keeps_gap_before_colon() {
        assert_eq!(
            build_prompt(&["style", ":", "oil"], JoinMode::Space),
            "style : oil"
        );
    }

    #[test]
    fn space_collapses_inner_whitespace() {
        assert_eq!(
            build_prompt(&["  red\t\thair  ", "blue   eyes"], JoinMode::Space),
            "red hair blue eyes"
        );
    }

    #[test]
    fn comma_drops_standalone_commas() {
        let tokens = ["red hair", ",", "blue eyes", ","];
        assert_eq!(build_prompt(&tokens, JoinMode::Comma), "red hair, blue eyes");
    }

    #[test]
    fn comma_does_not_dedup() {
        assert_eq!(build_prompt(&["cat", "cat"], JoinMode::Comma), "cat, cat");
    }

    #[test]
    fn comma_collapses_trailing_commas_in_tokens() {
        assert_eq!(
            build_prompt(&["red hair,", "blue eyes"], JoinMode::Comma),
            "red hair, blue eyes"
        );
        assert_eq!(
            build_prompt(&["a ,", "b"], JoinMode::Comma),
            "a, b"
        );
    }

    #[test]
    fn sentence_avoids_double_period() {
        let tokens = ["A tall tree", "A small house."];
        assert_eq!(
            build_prompt(&tokens, JoinMode::Sentence),
            "A tall tree. A small house."
        );
    }

    #[test]
    fn sentence_drops_standalone_periods() {
        assert_eq!(
            build_prompt(&["One", ".", "Two"], JoinMode::Sentence),
            "One. Two."
        );
    }

    #[test]
    fn sentence_keeps_other_terminal_marks() {
        assert_eq!(
            build_prompt(&["Is it raining?"], JoinMode::Sentence),
            "Is it raining?."
        );
    }

    #[test]
    fn empty_input_yields_empty_string() {
        let none: [&str; 0] = [];
        for mode in JoinMode::ALL {
            assert_eq!(build_prompt(&none, mode), "");
            assert_eq!(build_prompt(&[""], mode), "");
            assert_eq!(build_prompt(&["   ", "\n"], mode), "");
        }
    }

    #[test]
    fn normalize_trims_and_drops_empty() {
        assert_eq!(
            normalize_tokens(&["  a ", "", "   ", "b"]),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn punctuation_tokens_are_classified() {
        for mark in [",", ".", "!", "?", ";", ":", " ; "] {
            assert!(is_punctuation_token(mark), "{mark:?}");
        }
        for other in ["", "-", "..", "a", ",,"] {
            assert!(!is_punctuation_token(other), "{other:?}");
        }
    }

    #[test]
    fn split_comma() {
        assert_eq!(split_prompt("a, b, c", JoinMode::Comma), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_sentence() {
        assert_eq!(
            split_prompt("One. Two.", JoinMode::Sentence),
            vec!["One", "Two"]
        );
    }

    #[test]
    fn split_space_returns_whole_text() {
        assert_eq!(
            split_prompt("  free text with spaces ", JoinMode::Space),
            vec!["free text with spaces"]
        );
    }

    #[test]
    fn split_blank_is_empty() {
        for mode in JoinMode::ALL {
            assert!(split_prompt("  \n ", mode).is_empty());
        }
    }

    #[test]
    fn restore_prefers_stored_tokens() {
        let stored = vec!["x".to_string(), "y".to_string()];
        assert_eq!(
            restore_tokens("a, b", &stored, JoinMode::Comma),
            vec!["x", "y"]
        );
        assert_eq!(restore_tokens("a, b", &[], JoinMode::Comma), vec!["a", "b"]);
        assert_eq!(
            restore_tokens("a, b", &[" ".to_string()], JoinMode::Space),
            vec!["a, b"]
        );
    }

    #[test]
    fn join_mode_parses_and_rejects_unknown() {
        assert_eq!("comma".parse::<JoinMode>(), Ok(JoinMode::Comma));
        assert_eq!(JoinMode::Sentence.to_string(), "sentence");
        let err = "Comma".parse::<JoinMode>().unwrap_err();
        assert_eq!(err.input, "Comma");
        assert!(serde_json::from_str::<JoinMode>("\"newline\"").is_err());
        assert_eq!(
            serde_json::from_str::<JoinMode>("\"sentence\"").unwrap(),
            JoinMode::Sentence
        );
    }

    fn mode_strategy() -> impl Strategy<Value = JoinMode> {
        proptest::sample::select(JoinMode::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_pre_normalizing_does_not_change_output(
            tokens in proptest::collection::vec("[ a-z,.!?;:\t]{0,12}", 0..8),
            mode in mode_strategy(),
        ) {
            let normalized = normalize_tokens(&tokens);
            prop_assert_eq!(build_prompt(&normalized, mode), build_prompt(&tokens, mode));
        }

        #[test]
        fn prop_rejoining_split_output_is_stable(
            tokens in proptest::collection::vec("[a-z]{1,6}( [a-z]{1,6})?", 0..6),
            mode in mode_strategy(),
        ) {
            let joined = build_prompt(&tokens, mode);
            let rejoined = build_prompt(&split_prompt(&joined, mode), mode);
            prop_assert_eq!(rejoined, joined);
        }

        #[test]
        fn prop_comma_split_inverts_plain_words(
            tokens in proptest::collection::vec("[a-z]{1,6}( [a-z]{1,6})?", 1..6),
        ) {
            let joined = build_prompt(&tokens, JoinMode::Comma);
            prop_assert_eq!(split_prompt(&joined, JoinMode::Comma), tokens);
        }

        #[test]
        fn prop_output_never_has_outer_whitespace(
            tokens in proptest::collection::vec("(?s).{0,10}", 0..6),
            mode in mode_strategy(),
        ) {
            let joined = build_prompt(&tokens, mode);
            prop_assert_eq!(joined.trim(), joined.as_str());
        }
    }
}
