use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static BLANK_LINE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("valid regex"));

// Empty selection lists the editor serializes next to notepad text.
static SELECTION_NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?s)\{"selectedCommits":\[\].*?"selectedPullRequests":\[\]\}"#).expect("valid regex"),
        Regex::new(r#"(?s)"selectedImages":\[\].*?"folderSelections":\[\]\}"#).expect("valid regex"),
        Regex::new(r#"(?s)"terminalSelections":\[\].*?"externalLinks":\[\]\}"#).expect("valid regex"),
    ]
});

/// Tidies notepad-classified content for display.
///
/// A content string that is itself a JSON object with a string `text` field is replaced by that
/// field. Otherwise long runs of blank lines collapse to one blank line and the selection-list
/// boilerplate is removed.
pub fn clean_up_content(content: &str) -> String {
    if let Some(text) = embedded_text(content) {
        return text;
    }

    let mut result = BLANK_LINE_RUNS.replace_all(content, "\n\n").to_string();
    for pattern in SELECTION_NOISE.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }
    result.trim().to_string()
}

fn embedded_text(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed).ok()? {
        Value::Object(map) => map.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
