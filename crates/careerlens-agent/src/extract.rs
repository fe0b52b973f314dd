//! Tolerant extraction of structured data from model output.
//!
//! Model responses are free text that usually, but not always, contain the
//! JSON we asked for.  Extraction runs in two stages:
//!
//! 1. **Parse**: try each [`ParseStrategy`] in order and keep the first
//!    candidate that parses as JSON of the expected [`Shape`].
//! 2. **Validate**: list elements are validated one by one through
//!    [`FromItem`] and dropped on failure; objects are completed field by
//!    field through [`Repair`], yielding a [`Validated`] value.
//!
//! Nothing here returns an error.  Problems are logged and surface as
//! dropped items, defaulted fields, or `None`.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Shapes and strategies
// ---------------------------------------------------------------------------

/// Top-level JSON shape a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Array,
    Object,
}

impl Shape {
    fn delimiters(self) -> (char, char) {
        match self {
            Self::Array => ('[', ']'),
            Self::Object => ('{', '}'),
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// One way of locating a JSON payload inside a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// From the first opening delimiter of the shape to the last closing
    /// one, when both exist in that order.
    DelimitedSlice,
    /// The whole trimmed response.
    WholeText,
    /// The trimmed response with a leading ```` ``` ```` / ```` ```json ````
    /// opener and trailing ```` ``` ```` closer removed.
    FenceStripped,
    /// Every balanced span that starts at an opening delimiter, scanning
    /// left to right.  Delimiters inside JSON strings are ignored.
    BalancedSpan,
}

impl ParseStrategy {
    /// Strategies in the order they are attempted.
    pub const ORDER: [ParseStrategy; 4] = [
        ParseStrategy::DelimitedSlice,
        ParseStrategy::WholeText,
        ParseStrategy::FenceStripped,
        ParseStrategy::BalancedSpan,
    ];

    /// The candidate texts this strategy would hand to the JSON parser,
    /// in the order they are tried.
    pub fn candidates(self, text: &str, shape: Shape) -> Vec<&str> {
        match self {
            Self::DelimitedSlice => {
                let (open, close) = shape.delimiters();
                match (text.find(open), text.rfind(close)) {
                    (Some(start), Some(end)) if end > start => vec![&text[start..=end]],
                    _ => Vec::new(),
                }
            }
            Self::WholeText => vec![text.trim()],
            Self::FenceStripped => vec![strip_fence(text)],
            Self::BalancedSpan => balanced_spans(text, shape),
        }
    }
}

/// Spans of `text` from each opening delimiter to its matching closer.
fn balanced_spans(text: &str, shape: Shape) -> Vec<&str> {
    let (open, close) = shape.delimiters();
    text.char_indices()
        .filter(|&(_, c)| c == open)
        .filter_map(|(start, _)| {
            balanced_end(&text[start..], open, close).map(|len| &text[start..start + len])
        })
        .collect()
}

/// Byte length of the balanced span at the start of `s`, if it closes.
fn balanced_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}

fn strip_fence(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Locate and parse a payload of the given shape.
///
/// Returns `None` when no strategy yields JSON of the right shape.
pub fn parse_payload(text: &str, shape: Shape) -> Option<Value> {
    for strategy in ParseStrategy::ORDER {
        for candidate in strategy.candidates(text, shape) {
            match serde_json::from_str::<Value>(candidate) {
                Ok(value) if shape.matches(&value) => {
                    debug!(?strategy, ?shape, "payload parsed");
                    return Some(value);
                }
                Ok(_) => debug!(?strategy, ?shape, "payload has the wrong shape"),
                Err(e) => debug!(?strategy, ?shape, error = %e, "payload did not parse"),
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Outcome of validating an object against its schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    /// Every field was present and well-typed.
    Complete(T),
    /// Some fields were missing or ill-typed and were defaulted.
    Repaired {
        value: T,
        defaulted: Vec<&'static str>,
    },
}

impl<T> Validated<T> {
    /// The validated value, however it was obtained.
    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Repaired { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Complete(value) | Self::Repaired { value, .. } => value,
        }
    }

    /// Names of the fields that were defaulted.
    pub fn defaulted(&self) -> &[&'static str] {
        match self {
            Self::Complete(_) => &[],
            Self::Repaired { defaulted, .. } => defaulted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Why a single list item was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Strict per-item validation for list elements.
pub trait FromItem: Sized {
    fn from_item(value: &Value) -> Result<Self, ValidationError>;
}

/// Field-level completion for objects.
pub trait Repair: Sized {
    fn repair(fields: &Map<String, Value>) -> Validated<Self>;
}

/// Reads fields out of an object, substituting defaults and remembering
/// which fields needed one.
#[derive(Debug)]
pub struct FieldRepairer<'a> {
    fields: &'a Map<String, Value>,
    defaulted: Vec<&'static str>,
}

impl<'a> FieldRepairer<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            defaulted: Vec::new(),
        }
    }

    fn default_used(&mut self, field: &'static str) {
        warn!(field, "missing or invalid field, using default");
        self.defaulted.push(field);
    }

    /// A string field.
    pub fn text(&mut self, field: &'static str, default: &str) -> String {
        match self.fields.get(field).and_then(Value::as_str) {
            Some(s) => s.to_owned(),
            None => {
                self.default_used(field);
                default.to_owned()
            }
        }
    }

    /// A list-of-strings field.  Any non-string element invalidates the
    /// whole field.
    pub fn string_list(&mut self, field: &'static str) -> Vec<String> {
        let items = self.fields.get(field).and_then(Value::as_array).and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
        });
        match items {
            Some(items) => items,
            None => {
                self.default_used(field);
                Vec::new()
            }
        }
    }

    /// A string field parsed into `T`; unparseable values take `default`.
    pub fn parsed<T>(&mut self, field: &'static str, parse: fn(&str) -> Option<T>, default: T) -> T {
        match self.fields.get(field).and_then(Value::as_str).and_then(parse) {
            Some(value) => value,
            None => {
                self.default_used(field);
                default
            }
        }
    }

    /// Wrap `value` according to whether any default was used.
    pub fn finish<T>(self, value: T) -> Validated<T> {
        if self.defaulted.is_empty() {
            Validated::Complete(value)
        } else {
            Validated::Repaired {
                value,
                defaulted: self.defaulted,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Extract a list of `T` from a model response.
///
/// Items that fail validation are dropped with a warning; a response with
/// no parseable array yields an empty list.
pub fn extract_list<T: FromItem>(text: &str) -> Vec<T> {
    let Some(Value::Array(items)) = parse_payload(text, Shape::Array) else {
        warn!("no JSON array found in response");
        return Vec::new();
    };

    let total = items.len();
    let kept: Vec<T> = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match T::from_item(item) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(index, error = %e, "dropping invalid list item");
                None
            }
        })
        .collect();

    debug!(total, kept = kept.len(), "list extracted");
    kept
}

/// Extract an object of type `T` from a model response.
///
/// Returns `None` when no JSON object can be found; the caller decides
/// the fallback.
pub fn extract_object<T: Repair>(text: &str) -> Option<Validated<T>> {
    match parse_payload(text, Shape::Object) {
        Some(Value::Object(fields)) => Some(T::repair(&fields)),
        _ => {
            warn!("no JSON object found in response");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tag(String);

    impl FromItem for Tag {
        fn from_item(value: &Value) -> Result<Self, ValidationError> {
            value
                .as_str()
                .filter(|s| !s.is_empty())
                .map(|s| Tag(s.to_owned()))
                .ok_or_else(|| ValidationError::new("tag", "expected a non-empty string"))
        }
    }

    #[derive(Debug, PartialEq)]
    struct Note {
        title: String,
        tags: Vec<String>,
    }

    impl Repair for Note {
        fn repair(fields: &Map<String, Value>) -> Validated<Self> {
            let mut r = FieldRepairer::new(fields);
            let note = Note {
                title: r.text("title", "untitled"),
                tags: r.string_list("tags"),
            };
            r.finish(note)
        }
    }

    #[test]
    fn embedded_array_is_recovered_whatever_surrounds_it() {
        let payload = r#"[{"n": "a]b"}, {"n": "c"}]"#;
        let expected = json!([{"n": "a]b"}, {"n": "c"}]);
        let cases = [
            ("", ""),
            ("Sure! Here you go: ", " Hope that helps."),
            ("Skills [as requested]: ", ""),
            ("", " [1] see note]"),
            ("[draft] {meta} ", " (done] ["),
            ("```json\n", "\n```"),
            ("Quote \"[x\" then ", "\n}"),
        ];
        for (prefix, suffix) in cases {
            let text = format!("{prefix}{payload}{suffix}");
            assert_eq!(parse_payload(&text, Shape::Array), Some(expected.clone()), "{text}");
        }
    }

    #[test]
    fn embedded_object_is_recovered_past_stray_braces() {
        let text = r#"Use {curly} style: {"title": "t}", "tags": []} {end"#;
        assert_eq!(
            parse_payload(text, Shape::Object),
            Some(json!({"title": "t}", "tags": []}))
        );
    }

    #[test]
    fn delimited_slice_requires_ordered_delimiters() {
        assert!(ParseStrategy::DelimitedSlice.candidates("] nothing [", Shape::Array).is_empty());
        assert!(ParseStrategy::DelimitedSlice.candidates("no brackets", Shape::Array).is_empty());
    }

    #[test]
    fn balanced_spans_skip_delimiters_in_strings() {
        let spans = ParseStrategy::BalancedSpan.candidates(r#"[a] ["x]", "\"]"] [open"#, Shape::Array);
        assert_eq!(spans, vec!["[a]", r#"["x]", "\"]"]"#]);
    }

    #[test]
    fn fence_is_stripped() {
        assert_eq!(strip_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fence("  ```\n[1]\n```  "), "[1]");
        assert_eq!(strip_fence("plain"), "plain");
    }

    #[test]
    fn fenced_payload_parses_like_bare_one() {
        let bare = r#"{"title": "x", "tags": ["y"]}"#;
        let fenced = format!("```json\n{bare}\n```");
        assert_eq!(
            parse_payload(&fenced, Shape::Object),
            parse_payload(bare, Shape::Object)
        );
    }

    #[test]
    fn wrong_shape_is_a_parse_failure() {
        assert_eq!(parse_payload("[1, 2, 3]", Shape::Object), None);
        assert_eq!(parse_payload(r#"{"a": 1}"#, Shape::Array), None);
        assert_eq!(parse_payload("not json at all", Shape::Object), None);
    }

    #[test]
    fn invalid_items_are_dropped() {
        let tags: Vec<Tag> = extract_list(r#"["rust", 42, "tokio"]"#);
        assert_eq!(tags, vec![Tag("rust".into()), Tag("tokio".into())]);
    }

    #[test]
    fn unparseable_list_is_empty() {
        let tags: Vec<Tag> = extract_list("I could not find any tags.");
        assert!(tags.is_empty());
    }

    #[test]
    fn complete_object_is_complete() {
        let note: Validated<Note> =
            extract_object(r#"Result: {"title": "t", "tags": ["a"]}"#).unwrap();
        assert!(note.is_complete());
        assert_eq!(note.value().title, "t");
        assert!(note.defaulted().is_empty());
    }

    #[test]
    fn partial_object_is_repaired() {
        let note: Validated<Note> = extract_object(r#"{"tags": ["a", 1]}"#).unwrap();
        assert_eq!(note.defaulted(), &["title", "tags"]);
        assert_eq!(
            note.into_inner(),
            Note {
                title: "untitled".into(),
                tags: Vec::new()
            }
        );
    }

    #[test]
    fn missing_object_is_none() {
        assert!(extract_object::<Note>("[]").is_none());
        assert!(extract_object::<Note>("").is_none());
    }
}
