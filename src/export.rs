use crate::errors::{AppError, AppResult};
use crate::locator::cleanup::clean_up_content;
use crate::locator::CANONICAL_NOTEPAD_KEY;
use crate::models::{ExportFormat, Finding, IndividualNote};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotesExport<'a> {
    exported_at: DateTime<Utc>,
    search_term: Option<&'a str>,
    count: usize,
    notes: &'a [IndividualNote],
}

/// Renders one note. Content is written verbatim.
pub fn render_note(format: ExportFormat, note: &IndividualNote, exported_at: DateTime<Utc>) -> AppResult<String> {
    match format {
        ExportFormat::Text => Ok(render_note_text(note, exported_at)),
        ExportFormat::Markdown => Ok(render_note_markdown(note, exported_at)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(note)?),
    }
}

/// Renders a filtered set of notes along with the search term that produced it.
pub fn render_notes(
    format: ExportFormat,
    notes: &[IndividualNote],
    search_term: Option<&str>,
    exported_at: DateTime<Utc>,
) -> AppResult<String> {
    let search_term = search_term.filter(|term| !term.trim().is_empty());
    match format {
        ExportFormat::Text => Ok(render_notes_text(notes, search_term, exported_at)),
        ExportFormat::Markdown => Ok(render_notes_markdown(notes, search_term, exported_at)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&NotesExport {
            exported_at,
            search_term,
            count: notes.len(),
            notes,
        })?),
    }
}

fn render_note_text(note: &IndividualNote, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("Cursor Note Export\n");
    out.push_str(&format!("Exported: {}\n", exported_at.format(TIMESTAMP_FORMAT)));
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    push_text_metadata(&mut out, note);
    out.push_str(&"-".repeat(30));
    out.push_str("\n\n");
    out.push_str(&note.content);
    out
}

fn render_note_markdown(note: &IndividualNote, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Cursor Note Export\n\n");
    out.push_str(&format!("*Exported: {}*\n\n", exported_at.format(TIMESTAMP_FORMAT)));
    out.push_str("## Metadata\n\n");
    push_markdown_metadata(&mut out, note);
    out.push_str("## Content\n\n");
    out.push_str(&note.content);
    out
}

fn render_notes_text(notes: &[IndividualNote], search_term: Option<&str>, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("Cursor Notes Export (Filtered)\n");
    out.push_str(&format!("Exported: {}\n", exported_at.format(TIMESTAMP_FORMAT)));
    out.push_str(&format!("Search term: '{}'\n", search_term.unwrap_or_default()));
    out.push_str(&format!("Notes exported: {}\n", notes.len()));
    out.push_str(&"=".repeat(70));
    out.push_str("\n\n");

    for (index, note) in notes.iter().enumerate() {
        out.push_str(&format!("NOTE #{}\n", index + 1));
        push_text_metadata(&mut out, note);
        out.push_str(&"-".repeat(40));
        out.push('\n');
        out.push_str(&note.content);
        out.push('\n');
        out.push_str(&"=".repeat(70));
        out.push_str("\n\n");
    }
    out
}

fn render_notes_markdown(notes: &[IndividualNote], search_term: Option<&str>, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Cursor Notes Export (Filtered)\n\n");
    out.push_str(&format!("*Exported: {}*\n\n", exported_at.format(TIMESTAMP_FORMAT)));
    out.push_str(&format!("**Search term:** '{}'\n\n", search_term.unwrap_or_default()));
    out.push_str(&format!("**Notes exported:** {}\n\n", notes.len()));

    for (index, note) in notes.iter().enumerate() {
        if index > 0 {
            out.push_str("\n---\n\n");
        }
        out.push_str(&format!("## NOTE #{}\n\n", index + 1));
        push_markdown_metadata(&mut out, note);
        out.push_str("### Content\n\n");
        out.push_str(&note.content);
        out.push_str("\n\n");
    }
    out
}

fn push_text_metadata(out: &mut String, note: &IndividualNote) {
    out.push_str(&format!("Key: {}\n", note.original_key));
    if !note.title.is_empty() {
        out.push_str(&format!("Title: {}\n", note.title));
    }
    out.push_str(&format!("Database: {}\n", note.database));
    out.push_str(&format!("Table: {}\n", note.table));
    out.push_str(&format!("Size: {} bytes\n", note.size));
}

fn push_markdown_metadata(out: &mut String, note: &IndividualNote) {
    out.push_str("| Property | Value |\n");
    out.push_str("| --- | --- |\n");
    out.push_str(&format!("| Key | {} |\n", note.original_key));
    if !note.title.is_empty() {
        out.push_str(&format!("| Title | {} |\n", note.title));
    }
    out.push_str(&format!("| Database | {} |\n", note.database));
    out.push_str(&format!("| Table | {} |\n", note.table));
    out.push_str(&format!("| Size | {} bytes |\n\n", note.size));
}

/// Plain-text report of every finding, notepad entries first.
pub fn render_findings_report(findings: &[Finding], generated_at: DateTime<Utc>) -> String {
    let databases: HashSet<&str> = findings.iter().map(|finding| finding.database.as_str()).collect();
    let notepad_entries = findings.iter().filter(|finding| finding.is_notepad).count();
    let canonical_entries = findings
        .iter()
        .filter(|finding| finding.key == CANONICAL_NOTEPAD_KEY)
        .count();

    let mut out = String::new();
    out.push_str("Cursor Notes Search Results\n");
    out.push_str(&format!("Search completed: {}\n", generated_at.format(TIMESTAMP_FORMAT)));
    out.push_str(&format!("Databases scanned: {}\n", databases.len()));
    out.push_str(&format!("Total findings: {}\n", findings.len()));
    out.push_str(&format!("Notepad entries: {}\n", notepad_entries));
    out.push_str(&format!("NotepadData entries: {}\n", canonical_entries));
    out.push_str("Note: Duplicate reactiveStorageId entries have been filtered out\n");
    out.push_str(&"=".repeat(80));
    out.push_str("\n\n");

    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by(|a, b| {
        b.is_notepad
            .cmp(&a.is_notepad)
            .then_with(|| a.database.cmp(&b.database))
            .then_with(|| a.key.cmp(&b.key))
    });

    for (index, finding) in ordered.into_iter().enumerate() {
        let label = if finding.key == CANONICAL_NOTEPAD_KEY {
            "NOTEPAD"
        } else {
            finding.key.as_str()
        };
        out.push_str(&format!("FINDING #{} ({})\n", index + 1, label));
        out.push_str(&format!("Database: {}\n", finding.database));
        out.push_str(&format!("Table: {}\n", finding.table));
        out.push_str(&format!("Key: {}\n", finding.key));
        out.push_str(&format!("Size: {} bytes\n", finding.size));
        out.push_str(&"-".repeat(50));
        out.push('\n');
        if finding.is_notepad {
            out.push_str(&clean_up_content(&finding.content));
        } else {
            out.push_str(&finding.content);
        }
        out.push('\n');
        out.push_str(&"=".repeat(80));
        out.push_str("\n\n");
    }
    out
}

pub fn write_export(path: &Path, contents: &str) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
    }
    std::fs::write(path, contents).map_err(|error| {
        AppError::Io(format!("failed to write {}: {}", path.to_string_lossy(), error))
    })?;
    tracing::info!(path = %path.to_string_lossy(), bytes = contents.len(), "export written");
    Ok(())
}

/// File name offered for a single-note export, derived from the note title.
pub fn default_filename(note: &IndividualNote, format: ExportFormat) -> String {
    format!("{}.{}", sanitize_filename_component(&note.title), format.extension())
}

fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let candidate: String = out.trim_matches('_').chars().take(120).collect();
    if candidate.is_empty() {
        "note".to_string()
    } else {
        candidate
    }
}
