//! Recover JSON from free-form model output.
//!
//! Models wrap structured answers in prose, markdown fences, or both. The
//! extraction is a best-effort heuristic, tried in order:
//!
//! 1. The interior of a "```json" fenced block.
//! 2. A bracket scan: whichever of `[` or `{` appears first picks the shape,
//!    and the slice runs to the *last* matching closer in the text.
//!
//! Nested or unbalanced brackets in surrounding commentary can defeat the
//! scan; that is accepted. Nothing here panics or returns an error: failure
//! is `None`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Extract a JSON object or array from `text`, or `None` if nothing parses.
#[must_use]
pub fn extract_structured(text: &str) -> Option<Value> {
    if let Some(inner) = fenced_block(text) {
        match serde_json::from_str::<Value>(inner.trim()) {
            Ok(value) => return Some(value),
            Err(e) => debug!(error = %e, "Fenced JSON block did not parse, trying bracket scan"),
        }
    }

    let slice = bracket_slice(text)?;
    match serde_json::from_str::<Value>(slice) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, len = slice.len(), "Bracket-scanned JSON did not parse");
            None
        }
    }
}

/// Extract and deserialize into `T`. `None` if extraction or conversion fails.
#[must_use]
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = extract_structured(text)?;
    serde_json::from_value(value).ok()
}

/// Interior of the first "```json" fence, up to the next closing fence or
/// the end of the text.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE_OPEN)? + FENCE_OPEN.len();
    let rest = &text[start..];
    let end = rest.find(FENCE_CLOSE).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Slice from the first opener to the last matching closer.
fn bracket_slice(text: &str) -> Option<&str> {
    let first_array = text.find('[');
    let first_object = text.find('{');

    let (start, closer) = match (first_array, first_object) {
        (Some(a), Some(o)) if a < o => (a, ']'),
        (_, Some(o)) => (o, '}'),
        (Some(a), None) => (a, ']'),
        (None, None) => return None,
    };

    let end = text.rfind(closer)?;
    if end <= start {
        return None;
    }
    // Brackets are ASCII, so both indices sit on char boundaries.
    Some(&text[start..=end])
}
