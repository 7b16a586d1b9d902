//! ABOUTME: Lenient JSON parsing for LLM responses that are expected to be JSON
//! ABOUTME: Two-stage: fenced code block, then whole response, then default

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("static regex"));

/// Parses `response` as JSON, tolerating the two common LLM response
/// shapes: a fenced ```json code block, or the whole response being raw
/// JSON. Never panics or propagates a parse error — callers always get a
/// value, falling back to `default()` when both attempts fail.
///
/// This replaces exception-based "JSON was not valid; use fallback"
/// control flow with an explicit default-value branch.
pub fn parse_lenient<T, F>(response: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(caps) = FENCED_JSON.captures(response) {
        if let Ok(value) = serde_json::from_str::<T>(&caps[1]) {
            return value;
        }
    }
    if let Ok(value) = serde_json::from_str::<T>(response) {
        return value;
    }
    default()
}

/// Same two-stage strategy but returns `serde_json::Value`, useful when
/// the caller wants to merge in defaults for individual missing keys
/// rather than reconstruct a whole struct.
pub fn parse_lenient_value(response: &str) -> Option<serde_json::Value> {
    if let Some(caps) = FENCED_JSON.captures(response) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&caps[1]) {
            return Some(value);
        }
    }
    serde_json::from_str::<serde_json::Value>(response).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Thing {
        name: String,
    }

    #[test]
    fn parses_fenced_block() {
        let resp = "here you go:\n```json\n{\"name\": \"a\"}\n```\nthanks";
        let t: Thing = parse_lenient(resp, || Thing {
            name: "default".into(),
        });
        assert_eq!(t.name, "a");
    }

    #[test]
    fn parses_whole_response() {
        let resp = "{\"name\": \"b\"}";
        let t: Thing = parse_lenient(resp, || Thing {
            name: "default".into(),
        });
        assert_eq!(t.name, "b");
    }

    #[test]
    fn falls_back_to_default_on_garbage() {
        let resp = "not json at all";
        let t: Thing = parse_lenient(resp, || Thing {
            name: "default".into(),
        });
        assert_eq!(t.name, "default");
    }
}
