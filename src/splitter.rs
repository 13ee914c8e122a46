use crate::models::Note;
use serde_json::Value;

pub const UNTITLED_NOTE: &str = "Untitled Note";
pub const EMPTY_NOTE: &str = "Empty Note";
pub const UNFORMATTED_NOTE: &str = "Unformatted Note";
pub const NO_CONTENT: &str = "[No content]";
pub const EMPTY_NOTE_CONTENT: &str = "[Empty note content]";

/// Titles that mark a synthesized note rather than one the author named.
pub const PLACEHOLDER_TITLES: [&str; 3] = [UNTITLED_NOTE, EMPTY_NOTE, UNFORMATTED_NOTE];

const HEADING_PREFIX: &str = "# ";
const SEPARATOR_LINE: &str = "---";
const MAX_DERIVED_TITLE_CHARS: usize = 40;
const TRUNCATED_TITLE_CHARS: usize = 37;
const MIN_DERIVED_TITLE_CHARS: usize = 5;

/// Splits recovered text into notes. Never fails and never returns an empty list; every note
/// has a non-empty title and body.
pub fn parse_notes(text: &str) -> Vec<Note> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return vec![Note::new(EMPTY_NOTE, EMPTY_NOTE_CONTENT)];
    }

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        let notes = parse_notepads_json(text);
        if !notes.is_empty() {
            return notes;
        }
    }

    let notes = parse_sections(text);
    if !notes.is_empty() {
        return notes;
    }

    vec![derive_single_note(trimmed)]
}

fn parse_notepads_json(text: &str) -> Vec<Note> {
    let Ok(Value::Object(root)) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    let Some(Value::Object(notepads)) = root.get("notepads") else {
        return Vec::new();
    };

    notepads
        .values()
        .filter_map(Value::as_object)
        .map(|entry| {
            let title = entry
                .get("name")
                .and_then(scalar_text)
                .unwrap_or_else(|| UNTITLED_NOTE.to_string());
            let content = entry
                .get("text")
                .and_then(scalar_text)
                .unwrap_or_else(|| NO_CONTENT.to_string());
            Note::new(title, content)
        })
        .collect()
}

// Booleans and nulls count as missing and get the placeholder.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Section {
    title: String,
    lines: Vec<String>,
}

impl Section {
    fn has_material(&self) -> bool {
        !self.title.is_empty() || !self.lines.is_empty()
    }

    fn into_note(self) -> Note {
        let title = if self.title.is_empty() {
            UNTITLED_NOTE.to_string()
        } else {
            self.title
        };
        let body = self.lines.join("\n").trim().to_string();
        let content = if body.is_empty() { NO_CONTENT.to_string() } else { body };
        Note::new(title, content)
    }
}

// `# ` headings open a note, `---` closes it, and leading text before any heading becomes an
// untitled note.
fn parse_sections(text: &str) -> Vec<Note> {
    let mut notes = Vec::new();
    let mut current: Option<Section> = None;

    for line in text.split('\n') {
        let stripped = line.trim();
        if let Some(heading) = stripped.strip_prefix(HEADING_PREFIX) {
            flush(&mut current, &mut notes);
            current = Some(Section {
                title: heading.trim().to_string(),
                lines: Vec::new(),
            });
        } else if stripped == SEPARATOR_LINE {
            flush(&mut current, &mut notes);
        } else if let Some(section) = current.as_mut() {
            section.lines.push(line.to_string());
        } else if !stripped.is_empty() && notes.is_empty() {
            current = Some(Section {
                title: String::new(),
                lines: vec![line.to_string()],
            });
        }
    }
    flush(&mut current, &mut notes);
    notes
}

fn flush(current: &mut Option<Section>, notes: &mut Vec<Note>) {
    if let Some(section) = current.take() {
        if section.has_material() {
            notes.push(section.into_note());
        }
    }
}

fn derive_single_note(trimmed: &str) -> Note {
    let mut lines = trimmed.split('\n');
    let first = lines.next().map(str::trim).unwrap_or_default();
    if first.is_empty() {
        return Note::new(UNFORMATTED_NOTE, non_empty_or(trimmed, NO_CONTENT));
    }

    let title = if first.chars().count() > MAX_DERIVED_TITLE_CHARS {
        format!("{}...", first.chars().take(TRUNCATED_TITLE_CHARS).collect::<String>())
    } else {
        first.to_string()
    };

    let rest: Vec<&str> = lines.collect();
    let content = if title.chars().count() > MIN_DERIVED_TITLE_CHARS && !rest.is_empty() {
        rest.join("\n").trim().to_string()
    } else {
        trimmed.to_string()
    };
    Note::new(title, non_empty_or(&content, NO_CONTENT))
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

pub fn is_placeholder_title(title: &str) -> bool {
    title.is_empty() || PLACEHOLDER_TITLES.contains(&title)
}
