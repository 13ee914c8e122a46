use crate::config::ExtractorConfig;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use std::io;
use thiserror::Error;

pub const NOTEPAD_SEPARATOR: &str = "\n\n---\n\n";

/// Direct string fields that are taken as note text, in priority order.
const TEXT_FIELDS: [&str; 4] = ["content", "text", "note", "data"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("json nesting exceeds {0} levels")]
    DepthExceeded(usize),
    #[error("failed to serialize json fallback: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Pulls note-shaped text out of an arbitrary JSON tree.
///
/// Structural matches win over recursion, and recursion wins over the inline-serialization
/// fallback. `Ok(None)` means nothing note-shaped was found; `Err` means the walk itself failed.
#[derive(Debug, Clone)]
pub struct JsonNoteExtractor<'a> {
    skipped_fields: &'a [String],
    max_inline_chars: usize,
    max_depth: usize,
}

impl<'a> JsonNoteExtractor<'a> {
    pub fn new(config: &'a ExtractorConfig) -> Self {
        Self {
            skipped_fields: &config.skipped_fields,
            max_inline_chars: config.max_inline_json_chars,
            max_depth: config.max_json_depth,
        }
    }

    pub fn extract(&self, value: &Value) -> Result<Option<String>, ExtractError> {
        Ok(self.walk(value, 0)?.filter(|text| !text.is_empty()))
    }

    // A returned empty string still ends the search at this level, it just counts as a miss upstream.
    fn walk(&self, value: &Value, depth: usize) -> Result<Option<String>, ExtractError> {
        if depth > self.max_depth {
            return Err(ExtractError::DepthExceeded(self.max_depth));
        }
        if is_blank(value) {
            return Ok(None);
        }

        if let Value::Object(map) = value {
            if let Some(found) = self.match_object(map, depth)? {
                return Ok(Some(found));
            }
            if let Some(Value::String(text)) = map.get("text") {
                return Ok(Some(text.clone()));
            }
        }

        if spaced_len(value)? < self.max_inline_chars {
            return Ok(Some(serde_json::to_string_pretty(value)?));
        }
        Ok(None)
    }

    fn match_object(&self, map: &Map<String, Value>, depth: usize) -> Result<Option<String>, ExtractError> {
        match map.get("notepads") {
            Some(Value::Object(notepads)) => {
                let rendered: Vec<String> = notepads
                    .values()
                    .filter_map(Value::as_object)
                    .filter_map(render_notepad_entry)
                    .collect();
                if !rendered.is_empty() {
                    return Ok(Some(rendered.join(NOTEPAD_SEPARATOR)));
                }
            }
            _ => {
                if let Some(Value::String(text)) = map.get("text") {
                    return Ok(Some(match heading(map) {
                        Some(name) => format!("# {}\n\n{}", name, text),
                        None => text.clone(),
                    }));
                }
            }
        }

        for field in TEXT_FIELDS {
            if let Some(Value::String(text)) = map.get(field) {
                return Ok(Some(text.clone()));
            }
        }

        // The denylist only guards nested objects; list items are always searched.
        for (field, child) in map {
            match child {
                Value::Object(_) if !self.is_skipped(field) => {
                    if let Some(found) = self.nested(child, depth)? {
                        return Ok(Some(found));
                    }
                }
                Value::Array(items) => {
                    for item in items.iter().filter(|item| item.is_object()) {
                        if let Some(found) = self.nested(item, depth)? {
                            return Ok(Some(found));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn nested(&self, child: &Value, depth: usize) -> Result<Option<String>, ExtractError> {
        Ok(self.walk(child, depth + 1)?.filter(|text| !text.is_empty()))
    }

    fn is_skipped(&self, field: &str) -> bool {
        self.skipped_fields.iter().any(|skipped| skipped == field)
    }
}

fn render_notepad_entry(entry: &Map<String, Value>) -> Option<String> {
    let mut rendered = String::new();
    if let Some(name) = heading(entry) {
        rendered.push_str(&format!("# {}\n\n", name));
    }
    if let Some(text) = entry.get("text").and_then(Value::as_str) {
        rendered.push_str(text);
    }
    (!rendered.is_empty()).then_some(rendered)
}

// Booleans and nulls are not names.
fn heading(map: &Map<String, Value>) -> Option<String> {
    match map.get("name")? {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Writes `, ` and `: ` between items, the layout the inline size limit is measured against.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn spaced_len(value: &Value) -> Result<usize, ExtractError> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, SpacedFormatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).chars().count())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
