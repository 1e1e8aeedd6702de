use crate::error::AnalysisError;
use crate::llm::types::LLMValuationPayload;
use log::{debug, warn};

/// Pulls an [`LLMValuationPayload`] out of free-form backend text.
///
/// Candidates are tried in order: each balanced top-level `{...}` block as it
/// appears, the span from the first `{` to the last `}`, then the whole
/// trimmed text. The first candidate that decodes wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str) -> Result<LLMValuationPayload, AnalysisError> {
        let mut last_error: Option<String> = None;

        for candidate in candidates(raw) {
            match serde_json::from_str::<LLMValuationPayload>(candidate) {
                Ok(payload) => {
                    debug!("Parsed valuation payload for '{}'", payload.company);
                    return Ok(payload);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        let reason = last_error.unwrap_or_else(|| "response contains no JSON object".to_string());
        warn!("Could not parse valuation payload: {}", reason);
        Err(AnalysisError::ResponseFormat {
            reason,
            raw_response: raw.to_string(),
        })
    }
}

fn candidates(raw: &str) -> Vec<&str> {
    let mut out = balanced_objects(raw);

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            let span = &raw[start..=end];
            if !out.contains(&span) {
                out.push(span);
            }
        }
    }
    let trimmed = raw.trim();
    if !trimmed.is_empty() && !out.contains(&trimmed) {
        out.push(trimmed);
    }
    out
}

/// Top-level `{...}` blocks with matching braces, in order. Braces inside
/// JSON strings are ignored; quotes in the prose between blocks are not
/// tracked.
fn balanced_objects(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw.char_indices() {
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
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = offset;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(&raw[start..=offset]);
                }
            }
            _ => {}
        }
    }
    blocks
}
