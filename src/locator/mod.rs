pub mod cleanup;
pub mod extract;

use crate::config::ExtractorConfig;
use crate::db::StateDatabase;
use crate::decoder;
use crate::errors::AppResult;
use crate::models::{Finding, RawValue, ScanStatistics, ValueAnalysis};
use cleanup::clean_up_content;
use extract::JsonNoteExtractor;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const CANONICAL_NOTEPAD_KEY: &str = "notepadData";

/// Scans workspace databases for note-bearing keys and turns their values into [`Finding`]s.
#[derive(Debug, Clone, Default)]
pub struct NoteLocator {
    config: ExtractorConfig,
}

impl NoteLocator {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn scan_workspace(&self, root: &Path) -> Vec<Finding> {
        let database_files = self.config.database_files(root);
        if database_files.is_empty() {
            tracing::warn!(path = %root.to_string_lossy(), "no database files found");
            return Vec::new();
        }
        self.find_notes(&database_files)
    }

    /// Scans every file in order, then deduplicates. A database that fails to open is skipped.
    pub fn find_notes(&self, database_files: &[PathBuf]) -> Vec<Finding> {
        tracing::info!(count = database_files.len(), "starting note search");

        let mut findings = Vec::new();
        let mut scanned = 0usize;
        for path in database_files {
            match self.scan_database(path) {
                Ok(found) => {
                    findings.extend(found);
                    scanned += 1;
                }
                Err(error) => {
                    tracing::warn!(path = %path.to_string_lossy(), error = %error, "skipping unreadable database");
                }
            }
        }

        let findings = deduplicate_findings(findings);
        tracing::info!(findings = findings.len(), databases = scanned, "scan complete");
        findings
    }

    pub fn scan_database(&self, path: &Path) -> AppResult<Vec<Finding>> {
        tracing::debug!(path = %path.to_string_lossy(), "scanning database");
        let db = StateDatabase::open(path)?;
        let database_id = database_id(path);

        let mut findings = Vec::new();
        for table in db.tables() {
            findings.extend(self.scan_table(&db, &database_id, &table));
        }
        Ok(findings)
    }

    /// Known keys first, then pattern matches not already retained for this table.
    pub fn scan_table(&self, db: &StateDatabase, database_id: &str, table: &str) -> Vec<Finding> {
        tracing::debug!(table = %table, "scanning table");
        let mut findings = Vec::new();
        let mut retained: HashSet<String> = HashSet::new();

        for key in &self.config.known_keys {
            let Some(value) = db.get(key, Some(table)).filter(|value| !value.is_empty()) else {
                continue;
            };
            if let Some(finding) = self.process_value(database_id, table, key, &value) {
                retained.insert(key.clone());
                findings.push(finding);
            }
        }

        for pattern in &self.config.key_patterns {
            for key in db.search(pattern, Some(table)) {
                if retained.contains(&key) {
                    continue;
                }
                let Some(value) = db.get(&key, Some(table)).filter(|value| !value.is_empty()) else {
                    continue;
                };
                if let Some(finding) = self.process_value(database_id, table, &key, &value) {
                    retained.insert(key);
                    findings.push(finding);
                }
            }
        }
        findings
    }

    /// Turns one stored value into a finding, or `None` when it is too small or yields no text.
    pub fn process_value(&self, database_id: &str, table: &str, key: &str, value: &RawValue) -> Option<Finding> {
        let analysis = decoder::analyze(value);
        if analysis.size < self.config.min_value_bytes {
            return None;
        }

        let content = self.extract_content(value, &analysis);
        let trimmed_len = content.trim().chars().count();
        if trimmed_len <= self.config.min_content_chars {
            return None;
        }

        let is_notepad = is_notepad_key(key, trimmed_len, self.config.substantial_content_chars);
        let content = if is_notepad {
            let cleaned = clean_up_content(&content);
            if cleaned.trim().chars().count() <= self.config.min_content_chars {
                tracing::debug!(key = %key, table = %table, "notepad content empty after cleanup");
                return None;
            }
            cleaned
        } else {
            content
        };

        tracing::info!(
            key = %key,
            table = %table,
            size = analysis.size,
            kind = if is_notepad { "notepad" } else { "general" },
            "found content"
        );
        Some(Finding {
            database: database_id.to_string(),
            table: table.to_string(),
            key: key.to_string(),
            size: analysis.size,
            content: content.trim().to_string(),
            is_notepad,
        })
    }

    fn extract_content(&self, value: &RawValue, analysis: &ValueAnalysis) -> String {
        let Some(json) = analysis.json_data.as_ref() else {
            return decoder::decode_text(value).unwrap_or_default();
        };

        let mut content = match JsonNoteExtractor::new(&self.config).extract(json) {
            Ok(found) => found.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(error = %error, "json note extraction failed");
                String::new()
            }
        };

        // Raw text replaces a thin extraction only when it is longer.
        let extracted_len = content.trim().chars().count();
        if extracted_len < self.config.substantial_content_chars {
            if let Some(raw) = decoder::decode_text(value) {
                if raw.trim().chars().count() > extracted_len {
                    content = raw;
                }
            }
        }
        content
    }
}

/// A key naming a notepad always qualifies; a generic note key needs more than a few characters.
pub fn is_notepad_key(key: &str, trimmed_len: usize, substantial_chars: usize) -> bool {
    let key = key.to_lowercase();
    key.contains("notepad") || (key.contains("note") && trimmed_len > substantial_chars)
}

/// Keeps only the canonical `notepadData` findings of a database when it has any, dropping the
/// reactive-storage mirrors of the same notes. Group order follows first appearance.
pub fn deduplicate_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let initial = findings.len();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Finding>> = HashMap::new();
    for finding in findings {
        if !groups.contains_key(&finding.database) {
            order.push(finding.database.clone());
        }
        groups.entry(finding.database.clone()).or_default().push(finding);
    }

    let mut filtered = Vec::with_capacity(initial);
    for database in order {
        let Some(entries) = groups.remove(&database) else {
            continue;
        };
        if entries.iter().any(|entry| entry.key == CANONICAL_NOTEPAD_KEY) {
            filtered.extend(entries.into_iter().filter(|entry| entry.key == CANONICAL_NOTEPAD_KEY));
        } else {
            filtered.extend(entries);
        }
    }

    let skipped = initial - filtered.len();
    if skipped > 0 {
        tracing::info!(count = skipped, "deduplicated reactive storage entries");
    }

    for finding in &mut filtered {
        finding.is_notepad =
            finding.key == CANONICAL_NOTEPAD_KEY || finding.key.to_lowercase().contains("notepad");
    }
    filtered
}

pub fn statistics(findings: &[Finding]) -> ScanStatistics {
    if findings.is_empty() {
        return ScanStatistics::default();
    }

    let databases: HashSet<&str> = findings.iter().map(|finding| finding.database.as_str()).collect();
    let tables: HashSet<(&str, &str)> = findings
        .iter()
        .map(|finding| (finding.database.as_str(), finding.table.as_str()))
        .collect();
    let keys: BTreeSet<&str> = findings.iter().map(|finding| finding.key.as_str()).collect();
    let total_size: usize = findings.iter().map(|finding| finding.size).sum();

    ScanStatistics {
        total_findings: findings.len(),
        databases_with_findings: databases.len(),
        tables_with_findings: tables.len(),
        average_content_size: total_size / findings.len(),
        largest_finding_size: findings.iter().map(|finding| finding.size).max().unwrap_or(0),
        key_patterns_found: keys.into_iter().map(str::to_string).collect(),
    }
}

/// The database id is the name of the directory holding the file.
pub fn database_id(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{create_fixture, insert_blob};

    fn finding(database: &str, key: &str) -> Finding {
        Finding {
            database: database.to_string(),
            table: "ItemTable".to_string(),
            key: key.to_string(),
            size: 100,
            content: "some recovered content".to_string(),
            is_notepad: false,
        }
    }

    fn process(key: &str, value: &str) -> Option<Finding> {
        NoteLocator::default().process_value("db1", "ItemTable", key, &RawValue::from(value))
    }

    #[test]
    fn values_under_ten_bytes_are_ignored() {
        assert_eq!(process("notepad", "123456789"), None);
        assert!(process("notepad", "1234567890").is_some());
    }

    #[test]
    fn short_content_is_noise() {
        assert_eq!(process("randomConfig", "   abc    "), None);
        assert_eq!(process("randomConfig", "  abcde     "), None);
    }

    #[test]
    fn notepad_flag_follows_key_and_length() {
        let backup = process("MyNotepadBackup", "backup text goes here").expect("finding");
        assert!(backup.is_notepad);

        let config = process("randomConfig", "twenty chars of text").expect("finding");
        assert!(!config.is_notepad);

        let short_note = process("quickNote", "  1234567  ").expect("finding");
        assert!(!short_note.is_notepad);
        let long_note = process("quickNote", "more than ten characters").expect("finding");
        assert!(long_note.is_notepad);
    }

    #[test]
    fn json_values_use_the_note_heuristic() {
        let value = r#"{"notepads": {"a": {"name": "Foo", "text": "Bar and more"}}}"#;
        let found = process("notepadData", value).expect("finding");
        assert_eq!(found.content, "# Foo\n\nBar and more");
        assert!(found.is_notepad);
        assert_eq!(found.size, value.len());
    }

    #[test]
    fn thin_json_extraction_falls_back_to_longer_raw_text() {
        let value = r#"{"text": "short", "padding": "zzzzzzzzzz"}"#;
        let found = process("draftState", value).expect("finding");
        assert_eq!(found.content, value);
    }

    #[test]
    fn notepad_content_is_cleaned() {
        let value = "line one\n\n\n\nline two {\"selectedCommits\":[],\"selectedPullRequests\":[]}";
        let found = process("notepad", value).expect("finding");
        assert_eq!(found.content, "line one\n\nline two");
    }

    #[test]
    fn cleanup_that_leaves_too_little_drops_the_finding() {
        assert_eq!(process("notepad", r#"{"text": "hi", "id": 1234567}"#), None);
        assert_eq!(
            process("notepad", r#"ok {"selectedCommits":[],"x":1,"selectedPullRequests":[]}"#),
            None
        );
        assert_eq!(process("notepad", "abc {\"selectedImages\":[],\"folderSelections\":[]}"), None);
    }

    #[test]
    fn dedup_keeps_only_canonical_key_per_database() {
        let findings = vec![
            finding("db1", "notepad.reactiveStorageId"),
            finding("db1", "notepadData"),
            finding("db2", "workbench.notes"),
            finding("db2", "draftText"),
        ];
        let result = deduplicate_findings(findings);
        let keys: Vec<(&str, &str)> = result
            .iter()
            .map(|finding| (finding.database.as_str(), finding.key.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("db1", "notepadData"), ("db2", "workbench.notes"), ("db2", "draftText")]
        );
        assert!(result[0].is_notepad);
        assert!(!result[1].is_notepad);
        assert!(!result[2].is_notepad);
    }

    #[test]
    fn statistics_summarize_findings() {
        let mut large = finding("db2", "notes");
        large.size = 300;
        let stats = statistics(&[finding("db1", "notepadData"), finding("db1", "drafts"), large]);
        assert_eq!(stats.total_findings, 3);
        assert_eq!(stats.databases_with_findings, 2);
        assert_eq!(stats.tables_with_findings, 2);
        assert_eq!(stats.average_content_size, 166);
        assert_eq!(stats.largest_finding_size, 300);
        assert_eq!(
            stats.key_patterns_found,
            vec!["drafts".to_string(), "notepadData".to_string(), "notes".to_string()]
        );
        assert_eq!(statistics(&[]), ScanStatistics::default());
    }

    #[test]
    fn table_scan_probes_known_keys_then_patterns_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ws1").join("state.vscdb");
        create_fixture(
            &path,
            &[
                ("ItemTable", "workbench.panel.noteText", "a general note with body text"),
                ("ItemTable", "notepadData", r#"{"notepads": {"a": {"name": "Foo", "text": "Bar body"}}}"#),
                ("ItemTable", "unrelated.setting", "this key matches no pattern at all"),
            ],
        );

        let db = StateDatabase::open(&path).expect("open");
        let locator = NoteLocator::default();
        let findings = locator.scan_table(&db, "ws1", "ItemTable");
        let keys: Vec<&str> = findings.iter().map(|finding| finding.key.as_str()).collect();
        assert_eq!(keys, vec!["notepadData", "workbench.panel.noteText"]);
    }

    #[test]
    fn find_notes_skips_broken_databases_and_dedups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = dir.path().join("aaa").join("state.vscdb");
        create_fixture(
            &good,
            &[
                ("ItemTable", "notepadData", r#"{"notepads": {"a": {"name": "Foo", "text": "Bar body"}}}"#),
                ("ItemTable", "notepad.reactiveStorageId", r#"{"text": "mirror of the same notes"}"#),
            ],
        );
        let broken = dir.path().join("bbb").join("state.vscdb");
        std::fs::create_dir_all(broken.parent().expect("parent")).expect("dir");
        std::fs::write(&broken, b"this is definitely not a sqlite file").expect("write");
        let binary = dir.path().join("ccc").join("state.vscdb");
        insert_blob(&binary, "ItemTable", "drafts", &[0x66, 0x6F, 0x6F, 0xE9, 0x20, 0x62, 0x61, 0x72, 0x21, 0x21, 0x21]);

        let locator = NoteLocator::default();
        let findings = locator.find_notes(&[good, broken, binary]);
        let keys: Vec<(&str, &str)> = findings
            .iter()
            .map(|finding| (finding.database.as_str(), finding.key.as_str()))
            .collect();
        assert_eq!(keys, vec![("aaa", "notepadData"), ("ccc", "drafts")]);
        assert_eq!(findings[1].content, "fooé bar!!!");
    }

    #[test]
    fn database_id_is_parent_directory() {
        assert_eq!(database_id(Path::new("/ws/abc123/state.vscdb")), "abc123");
    }
}
