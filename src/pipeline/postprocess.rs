//! Post-processing: turn a backend or model response into a
//! [`SimplifiedPage`].
//!
//! Responses come from two places with slightly different habits. The REST
//! backend sends clean JSON; language models wrap it in ```json fences,
//! prepend a sentence of chatter, or number their sentences. The rules here
//! are small and deterministic, and each one is tested on its own.
//!
//! Field names are accepted in both spellings seen in the wild:
//! `easy_read_sentences` / `sentences`, `sentence` / `text`, and
//! `image_retrieval` / `imageRetrievalTag`.

use crate::output::SentenceUnit;
use crate::pipeline::simplify::SimplifiedPage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Tag used when a sentence arrives without one.
pub const DEFAULT_TAG: &str = "none";

/// Parse a raw text response. Anything that is not a JSON object with a
/// sentence list comes back with `sentences: None`.
pub fn parse_response(raw: &str) -> SimplifiedPage {
    let Some(json) = extract_json_object(raw) else {
        return SimplifiedPage::default();
    };
    match serde_json::from_str::<Value>(&json) {
        Ok(value) => parse_value(&value),
        Err(_) => SimplifiedPage::default(),
    }
}

/// Interpret an already-decoded JSON value.
pub fn parse_value(value: &Value) -> SimplifiedPage {
    let Some(obj) = value.as_object() else {
        return SimplifiedPage::default();
    };

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(clean_sentence)
        .filter(|t| !t.is_empty());

    let list = obj
        .get("easy_read_sentences")
        .or_else(|| obj.get("sentences"))
        .and_then(Value::as_array);

    let sentences = list.map(|items| items.iter().filter_map(parse_sentence).collect());

    SimplifiedPage { title, sentences }
}

fn parse_sentence(item: &Value) -> Option<SentenceUnit> {
    let (text, tag) = match item {
        Value::String(s) => (s.as_str(), None),
        Value::Object(o) => (
            o.get("sentence")
                .or_else(|| o.get("text"))
                .and_then(Value::as_str)?,
            o.get("image_retrieval")
                .or_else(|| o.get("imageRetrievalTag"))
                .or_else(|| o.get("image_retrieval_tag"))
                .and_then(Value::as_str),
        ),
        _ => return None,
    };

    let text = clean_sentence(text);
    if text.is_empty() {
        return None;
    }
    let tag = tag
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TAG);
    Some(SentenceUnit::new(text, tag))
}

// ── Rule 1: Strip fences and surrounding chatter ─────────────────────────────

static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n\s*```").unwrap());

/// Find the JSON object in a model response.
///
/// Prefers the contents of a fenced block; otherwise takes the span from
/// the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let body = match RE_FENCED_JSON.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => raw.to_string(),
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(body[start..=end].to_string())
}

// ── Rule 2: Sentence cleanup ─────────────────────────────────────────────────

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]\s+|\d{1,3}[.)]\s+)").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise one sentence: drop invisible characters, collapse whitespace,
/// strip a leading list marker the model added.
pub fn clean_sentence(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = RE_WHITESPACE.replace_all(s.trim(), " ");
    RE_LIST_MARKER.replace(&s, "").trim().to_string()
}

// ── Rule 3: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
            )
        })
        .collect()
}
