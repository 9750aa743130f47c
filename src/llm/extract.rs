//! Pulls a JSON object out of free-form model output
//!
//! Models wrap their answer in prose, fence it in ```json blocks, or emit raw
//! newlines inside string values. Extraction tries the fenced block first and
//! falls back to the outermost `{...}` span.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json|JSON)\s*(.*?)```").unwrap();
}

/// Extract the first JSON object found in `text`, or `None`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        let block = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if let Some(value) = parse_object(block) {
            return Some(value);
        }
        tracing::debug!("Fenced JSON block did not parse, trying bare object");
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Value> {
    let candidate = candidate.trim();
    let parsed = serde_json::from_str::<Value>(candidate)
        .or_else(|_| serde_json::from_str::<Value>(&escape_raw_newlines(candidate)));

    match parsed {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Escape literal newlines, carriage returns and tabs that appear inside JSON
/// string values. Whitespace between tokens is left untouched.
pub fn escape_raw_newlines(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }

    out
}
