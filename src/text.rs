//! Text shaping for cell values.
//!
//! One ordered, pure pipeline turns a raw field value into display text:
//!
//! 1. a missing value becomes the empty string;
//! 2. hazard/safety fields are summarised into a short bulleted list;
//! 3. otherwise, when summarising is requested, long values are truncated;
//! 4. text with more tokens than the wrap width is hard-wrapped into lines of
//!    exactly that many tokens, line breaks from earlier rules included.
//!
//! Composite components additionally get their prefix prepended
//! ([`TextRules::component`]). Each rule is applied exactly once per cell.

use serde::{Deserialize, Serialize};

use crate::table::Value;

/// Marker placed before each hazard summary line.
pub const BULLET: &str = "• ";

/// Marker for elided content.
pub const ELLIPSIS: &str = "...";

/// Field-name fragments that select hazard summarisation (case-insensitive).
const HAZARD_KEYWORDS: [&str; 2] = ["hazard", "safety"];

/// Thresholds for the text pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRules {
    /// Maximum number of bulleted segments kept from a hazard field.
    pub hazard_max_segments: usize,
    /// Token count above which summarised values are truncated.
    pub summarize_threshold: usize,
    /// Tokens kept when a value is truncated.
    pub summarize_keep: usize,
    /// Tokens per line when hard-wrapping.
    pub wrap_width: usize,
}

impl Default for TextRules {
    fn default() -> Self {
        Self {
            hazard_max_segments: 5,
            summarize_threshold: 40,
            summarize_keep: 30,
            wrap_width: 15,
        }
    }
}

impl TextRules {
    /// Shape a field value for display. `field` is the source field name and
    /// drives hazard detection.
    pub fn transform(&self, value: &Value, field: &str, summarize: bool) -> String {
        let Some(raw) = value.as_text() else {
            return String::new();
        };

        let shaped = if is_hazard_field(field) {
            summarize_hazards(&raw, self.hazard_max_segments)
        } else if summarize {
            truncate_tokens(&raw, self.summarize_threshold, self.summarize_keep)
        } else {
            raw.into_owned()
        };

        wrap_tokens(&shaped, self.wrap_width)
    }

    /// Shape a composite component: the transformed value with its prefix.
    /// `None` when the value is missing, so the component is left out of the
    /// cell entirely instead of contributing a bare prefix.
    pub fn component(
        &self,
        value: &Value,
        field: &str,
        summarize: bool,
        prefix: &str,
    ) -> Option<String> {
        if value.is_missing() {
            return None;
        }
        Some(format!("{prefix}{}", self.transform(value, field, summarize)))
    }
}

/// True when the field name marks a hazard or safety category.
pub fn is_hazard_field(field: &str) -> bool {
    let lower = field.to_lowercase();
    HAZARD_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Split a `;`-delimited hazard statement into at most `max_segments`
/// bulleted lines, adding an [`ELLIPSIS`] line when segments were dropped.
pub fn summarize_hazards(text: &str, max_segments: usize) -> String {
    let segments: Vec<&str> = text
        .split(';')
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == ';' || c == ','))
        .filter(|s| !s.is_empty())
        .collect();

    let mut lines: Vec<String> = segments
        .iter()
        .take(max_segments)
        .map(|s| format!("{BULLET}{s}"))
        .collect();
    if segments.len() > max_segments {
        lines.push(ELLIPSIS.to_string());
    }
    lines.join("\n")
}

/// Keep the first `keep` whitespace tokens (followed by [`ELLIPSIS`]) when the
/// text has more than `threshold` tokens; otherwise return it unchanged.
pub fn truncate_tokens(text: &str, threshold: usize, keep: usize) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= threshold {
        return text.to_string();
    }
    format!("{}{ELLIPSIS}", tokens[..keep.min(tokens.len())].join(" "))
}

/// Hard-wrap `text` into lines of `width` tokens when it has more than
/// `width` tokens in total. Existing line breaks do not count as boundaries;
/// tokens are never dropped or reordered. Shorter text is returned as is.
pub fn wrap_tokens(text: &str, width: usize) -> String {
    if width == 0 || token_count(text) <= width {
        return text.to_string();
    }
    reflow(text, width)
}

/// Re-flow all tokens of `text` into lines of `width` tokens, ignoring the
/// existing line structure.
pub fn reflow(text: &str, width: usize) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if width == 0 {
        return tokens.join(" ");
    }
    tokens
        .chunks(width)
        .map(|chunk| chunk.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of whitespace-delimited tokens.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
