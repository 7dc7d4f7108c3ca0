use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::clean::clean_json_block;

/// Non-greedy object inside a ``` or ```json fence.
static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*(\{[\s\S]+?\})\s*```").expect("valid regex")
});

/// A way of locating candidate JSON blocks in free text.
pub trait ExtractionStrategy {
    fn name(&self) -> &'static str;

    /// Candidate blocks, in the order they should be tried.
    fn candidates<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// Every fenced block, in order of appearance.
pub struct FencedBlockStrategy;

impl ExtractionStrategy for FencedBlockStrategy {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn candidates<'a>(&self, text: &'a str) -> Vec<&'a str> {
        FENCED_BLOCK_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect()
    }
}

/// The single span from the first `{` to the last `}`.
pub struct GreedyBraceStrategy;

impl ExtractionStrategy for GreedyBraceStrategy {
    fn name(&self) -> &'static str {
        "greedy_brace"
    }

    fn candidates<'a>(&self, text: &'a str) -> Vec<&'a str> {
        greedy_brace_span(text).map(|(_, span)| span).into_iter().collect()
    }
}

pub(crate) fn greedy_brace_span(text: &str) -> Option<(usize, &str)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| (start, &text[start..=end]))
}

/// Prioritized strategy chain that turns model chatter into a JSON object.
pub struct JsonRecovery {
    strategies: Vec<Box<dyn ExtractionStrategy + Send + Sync>>,
}

impl Default for JsonRecovery {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FencedBlockStrategy),
            Box::new(GreedyBraceStrategy),
        ])
    }
}

impl JsonRecovery {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy + Send + Sync>>) -> Self {
        Self { strategies }
    }

    /// First candidate (across all strategies, in order) that cleans and parses
    /// to a JSON object. Candidates that fail are logged and skipped.
    pub fn recover(&self, text: &str) -> Option<Map<String, Value>> {
        for strategy in &self.strategies {
            for candidate in strategy.candidates(text) {
                let cleaned = clean_json_block(candidate);
                match serde_json::from_str::<Value>(&cleaned) {
                    Ok(Value::Object(map)) => {
                        tracing::debug!(strategy = strategy.name(), "Recovered JSON object");
                        return Some(map);
                    }
                    Ok(other) => {
                        tracing::debug!(
                            strategy = strategy.name(),
                            kind = json_kind(&other),
                            "Candidate parsed to a non-object, skipping"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            strategy = strategy.name(),
                            error = %e,
                            block = %cleaned,
                            "Candidate block is not valid JSON"
                        );
                    }
                }
            }
        }
        None
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Recover a JSON object with the default fenced-then-greedy chain.
pub fn recover_json(text: &str) -> Option<Map<String, Value>> {
    JsonRecovery::default().recover(text)
}

/// Every top-level JSON object in `text` that parses strictly, with its byte offset.
///
/// Scans left to right. After a successful parse the scan resumes past the
/// object. A balanced `{...}` that fails to parse is skipped whole, so objects
/// nested inside a malformed one are never reported.
pub fn scan_top_level_objects(text: &str) -> Vec<(usize, Map<String, Value>)> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => {
                pos = start + stream.byte_offset();
                found.push((start, map));
            }
            // An unclosed brace is treated as stray text.
            _ => pos = balanced_end(text, start).unwrap_or(start + 1),
        }
    }
    found
}

/// Byte offset just past the `}` that closes the `{` at `start`, ignoring
/// braces inside string literals.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pick the final object from a buffer: candidates are the greedy brace span
/// plus every top-level object, tried from the last-appearing to the first.
/// Objects nested inside a malformed outer object are not candidates.
pub fn last_parsable_object(text: &str) -> Option<Map<String, Value>> {
    let mut candidates: Vec<(usize, Map<String, Value>)> = scan_top_level_objects(text);

    if let Some((start, span)) = greedy_brace_span(text) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(span) {
            // Ties with a scanned object at the same offset resolve to the scan.
            candidates.insert(0, (start, map));
        }
    }

    candidates
        .into_iter()
        .max_by_key(|(start, _)| *start)
        .map(|(_, map)| map)
}
