//! Structured strategy description.
//!
//! `StrategySpec` is what the interpretation service returns for a
//! free-text strategy. The wire format is a JSON object, often wrapped in a
//! Markdown code fence by the model; `parse_strategy_response` accepts both.

use serde::Deserialize;
use std::fmt;

use crate::domain::error::PatternIqError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternName {
    None,
    SupportBounce,
    ResistanceBreakout,
    Other(String),
}

impl PatternName {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "none" => PatternName::None,
            "support_bounce" => PatternName::SupportBounce,
            "resistance_breakout" => PatternName::ResistanceBreakout,
            other => PatternName::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PatternName::None => "none",
            PatternName::SupportBounce => "support_bounce",
            PatternName::ResistanceBreakout => "resistance_breakout",
            PatternName::Other(name) => name,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PatternName::None)
    }
}

impl fmt::Display for PatternName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySpec {
    pub entry_condition: String,
    pub pattern: PatternName,
    pub required_indicators: Vec<String>,
}

/// Source text of a dynamically supplied predicate. Never trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSource(pub String);

impl PredicateSource {
    pub fn new(text: &str) -> Self {
        PredicateSource(strip_code_fences(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Deserialize)]
struct WireSpec {
    #[serde(default)]
    entry_condition: Option<String>,
    pattern_to_find: Option<serde_json::Value>,
    #[serde(default)]
    required_indicators: Option<Vec<String>>,
}

/// Remove a surrounding Markdown code fence (with or without a language tag).
///
/// The tag may end the opening line or sit on the same line as the body, as
/// in "```json {...}```". Anything after the closing fence is dropped.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = &rest[info_string_len(rest)..];
    let body = match body.rfind("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// Length of the language tag right after an opening fence, or 0.
///
/// A tag is a word followed by whitespace or by the start of a JSON value;
/// "```ABOVE(close, 1)```" has none.
fn info_string_len(rest: &str) -> usize {
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
        .unwrap_or(rest.len());
    match rest[end..].chars().next() {
        Some(c) if c.is_whitespace() || c == '{' || c == '[' => end,
        _ => 0,
    }
}

/// The outermost `{...}` span of `text`, or `text` itself when there is none.
fn json_object_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse the interpretation service's structured response.
///
/// Code fences and any prose around the first JSON object are ignored.
pub fn parse_strategy_response(text: &str) -> Result<StrategySpec, PatternIqError> {
    let cleaned = strip_code_fences(text);
    let wire: WireSpec =
        serde_json::from_str(json_object_span(&cleaned)).map_err(|e| PatternIqError::StrategyParse {
            reason: format!("response is not the expected JSON object: {e}"),
        })?;

    let pattern = match wire.pattern_to_find {
        Some(serde_json::Value::String(s)) => PatternName::parse(&s),
        Some(other) => {
            return Err(PatternIqError::StrategyParse {
                reason: format!("pattern_to_find must be a string, got {other}"),
            });
        }
        None => {
            return Err(PatternIqError::StrategyParse {
                reason: "pattern_to_find is missing".into(),
            });
        }
    };

    Ok(StrategySpec {
        entry_condition: wire.entry_condition.unwrap_or_default().trim().to_string(),
        pattern,
        required_indicators: wire.required_indicators.unwrap_or_default(),
    })
}
