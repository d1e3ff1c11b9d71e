//! Mention tokenizer.
//!
//! Splits message text into literal and mention segments for rendering.
//! Two forms are recognized:
//!
//! - `@"Multi Word Name"`: quoted, for names containing whitespace
//! - `@SingleToken`: bareword, runs to the next whitespace
//!
//! Purely syntactic: nothing here checks that a token names a real user.
//! Malformed markup (an unterminated quote, a lone `@`) stays literal.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Quoted form first so `@"Jane Doe"` never splits into a bareword. A
/// bareword may not start with `"`, which keeps `@"unterminated` literal.
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@"([^"]+)"|@([^\s"]\S*)"#).expect("mention pattern is valid")
});

/// One piece of tokenized message text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionSegment {
    /// The exact source text of this segment (markup included for mentions).
    pub text: String,
    pub is_mention: bool,
    /// Inner name or token of a mention; `None` for literals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl MentionSegment {
    pub fn literal(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_mention: false, user_id: None }
    }

    pub fn mention(text: impl Into<String>, token: impl Into<String>) -> Self {
        Self { text: text.into(), is_mention: true, user_id: Some(token.into()) }
    }
}

/// Split `text` into ordered literal/mention segments.
///
/// Never returns an empty list: text without mentions (including the empty
/// string) comes back as a single literal segment.
pub fn tokenize(text: &str) -> Vec<MentionSegment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in MENTION_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(token) = caps.get(1).or_else(|| caps.get(2)) else { continue };

        if whole.start() > last {
            segments.push(MentionSegment::literal(&text[last..whole.start()]));
        }
        segments.push(MentionSegment::mention(whole.as_str(), token.as_str()));
        last = whole.end();
    }

    if segments.is_empty() {
        return vec![MentionSegment::literal(text)];
    }
    if last < text.len() {
        segments.push(MentionSegment::literal(&text[last..]));
    }
    segments
}

/// Inner tokens of every mention in `text`, in order of appearance.
pub fn mentioned_names(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter_map(|s| s.user_id)
        .collect()
}

/// Canonical mention markup for a display name.
///
/// Quoted when the name contains whitespace, bare otherwise.
pub fn mention_markup(display_name: &str) -> String {
    if display_name.chars().any(char::is_whitespace) {
        format!("@\"{display_name}\"")
    } else {
        format!("@{display_name}")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[MentionSegment]) -> Vec<(&str, bool)> {
        segments.iter().map(|s| (s.text.as_str(), s.is_mention)).collect()
    }

    #[test]
    fn test_mixed_forms() {
        let segments = tokenize(r#"Hi @Jo and @"Jane Doe" !"#);
        assert_eq!(
            texts(&segments),
            vec![
                ("Hi ", false),
                ("@Jo", true),
                (" and ", false),
                (r#"@"Jane Doe""#, true),
                (" !", false),
            ]
        );
        assert_eq!(segments[1].user_id.as_deref(), Some("Jo"));
        assert_eq!(segments[3].user_id.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_no_mentions_is_single_literal() {
        for s in ["", "plain text", "email me at a.b", "  spaced  "] {
            assert_eq!(tokenize(s), vec![MentionSegment::literal(s)], "input {s:?}");
        }
    }

    #[test]
    fn test_lone_at_is_literal() {
        assert_eq!(tokenize("@"), vec![MentionSegment::literal("@")]);
        assert_eq!(tokenize("a @ b"), vec![MentionSegment::literal("a @ b")]);
    }

    #[test]
    fn test_unterminated_quote_is_literal() {
        let s = r#"hey @"Jane Doe"#;
        assert_eq!(tokenize(s), vec![MentionSegment::literal(s)]);
    }

    #[test]
    fn test_empty_quotes_is_literal() {
        let s = r#"@"" hi"#;
        assert_eq!(tokenize(s), vec![MentionSegment::literal(s)]);
    }

    #[test]
    fn test_mention_at_boundaries() {
        assert_eq!(texts(&tokenize("@Ada")), vec![("@Ada", true)]);
        assert_eq!(
            texts(&tokenize("@Ada @Grace")),
            vec![("@Ada", true), (" ", false), ("@Grace", true)]
        );
    }

    #[test]
    fn test_bareword_stops_at_whitespace_only() {
        let segments = tokenize("ping @ada.lovelace, thanks");
        assert_eq!(segments[1].user_id.as_deref(), Some("ada.lovelace,"));
    }

    #[test]
    fn test_segments_concatenate_to_input() {
        let s = r#"@A x @"B C" y @D"#;
        let joined: String = tokenize(s).into_iter().map(|seg| seg.text).collect();
        assert_eq!(joined, s);
    }

    #[test]
    fn test_multibyte_text() {
        let segments = tokenize("café @Zoë ☕");
        assert_eq!(texts(&segments), vec![("café ", false), ("@Zoë", true), (" ☕", false)]);
    }

    #[test]
    fn test_mentioned_names() {
        assert_eq!(
            mentioned_names(r#"@Jo and @"Jane Doe""#),
            vec!["Jo".to_string(), "Jane Doe".to_string()]
        );
        assert!(mentioned_names("nobody").is_empty());
    }

    #[test]
    fn test_mention_markup() {
        assert_eq!(mention_markup("Ada"), "@Ada");
        assert_eq!(mention_markup("Jane Doe"), r#"@"Jane Doe""#);
    }

    #[test]
    fn test_markup_roundtrips_through_tokenizer() {
        for name in ["Ada", "Jane Doe", "grace@example.com"] {
            let segments = tokenize(&mention_markup(name));
            assert_eq!(segments.len(), 1);
            assert_eq!(segments[0].user_id.as_deref(), Some(name));
        }
    }
}
