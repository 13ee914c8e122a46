use crate::config::{validate_workspace_path, ExtractorConfig};
use crate::locator::NoteLocator;
use crate::models::{Finding, IndividualNote, SortDirection, SortKey};
use crate::splitter::{is_placeholder_title, parse_notes};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Both markers present means the editor stored an empty notepad collection.
const EMPTY_NOTEPAD_MARKERS: [&str; 2] = ["{\"notepads\": {}", "\"notepadDataVersion\": 0"];

/// Outcome of one scan as handed to a front end. A failed scan is zero findings plus a diagnostic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub workspace: PathBuf,
    pub findings: Vec<Finding>,
    pub notes: Vec<IndividualNote>,
    pub diagnostic: Option<String>,
}

pub fn scan(config: &ExtractorConfig) -> ScanReport {
    let workspace = config.workspace_path();
    if !validate_workspace_path(&workspace) {
        return ScanReport {
            diagnostic: Some(format!(
                "workspace path {} does not exist or is not a directory",
                workspace.to_string_lossy()
            )),
            workspace,
            findings: Vec::new(),
            notes: Vec::new(),
        };
    }

    let findings = NoteLocator::new(config.clone()).scan_workspace(&workspace);
    let notes = build_individual_notes(&findings, &workspace, config);
    let diagnostic = if findings.is_empty() {
        Some("no notes found".to_string())
    } else {
        None
    };
    ScanReport {
        workspace,
        findings,
        notes,
        diagnostic,
    }
}

pub fn is_empty_notepad(content: &str) -> bool {
    EMPTY_NOTEPAD_MARKERS.iter().all(|marker| content.contains(marker))
}

/// Splits every finding into notes, keeping only notes whose title the author actually wrote.
pub fn build_individual_notes(findings: &[Finding], root: &Path, config: &ExtractorConfig) -> Vec<IndividualNote> {
    let now = Utc::now();
    let mut notes = Vec::new();

    for finding in findings {
        if is_empty_notepad(&finding.content) {
            continue;
        }
        let modified = modified_time(&config.database_path(root, &finding.database)).unwrap_or(now);

        for parsed in parse_notes(&finding.content) {
            if is_placeholder_title(&parsed.title) {
                continue;
            }
            notes.push(IndividualNote {
                database: finding.database.clone(),
                table: finding.table.clone(),
                key: finding.key.clone(),
                original_key: finding.key.clone(),
                title: parsed.title,
                size: parsed.content.len(),
                content: parsed.content,
                modified,
            });
        }
    }
    notes
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(time) => Some(DateTime::<Utc>::from(time)),
        Err(error) => {
            tracing::debug!(path = %path.to_string_lossy(), error = %error, "modification time unavailable");
            None
        }
    }
}

/// Case-insensitive substring match on title or content. A blank term keeps every note.
pub fn filter_notes(notes: &[IndividualNote], term: &str) -> Vec<IndividualNote> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return notes.to_vec();
    }
    notes
        .iter()
        .filter(|note| note.title.to_lowercase().contains(&term) || note.content.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

/// `RecentlyModified` is ordered by recency, so ascending lists the newest note first.
pub fn sort_notes(notes: &mut [IndividualNote], key: SortKey, direction: SortDirection) {
    match (key, direction) {
        (SortKey::Title, SortDirection::Ascending) => {
            notes.sort_by_key(|note| note.title.to_lowercase());
        }
        (SortKey::Title, SortDirection::Descending) => {
            notes.sort_by(|a, b| b.title.to_lowercase().cmp(&a.title.to_lowercase()));
        }
        (SortKey::RecentlyModified, SortDirection::Ascending) => {
            notes.sort_by(|a, b| b.modified.cmp(&a.modified));
        }
        (SortKey::RecentlyModified, SortDirection::Descending) => {
            notes.sort_by_key(|note| note.modified);
        }
    }
}
