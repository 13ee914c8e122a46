use std::fs;
use std::path::Path;

use chrono::Utc;
use notepad_extractor_lib::catalog;
use notepad_extractor_lib::config::ExtractorConfig;
use notepad_extractor_lib::export;
use notepad_extractor_lib::locator::{self, NoteLocator};
use notepad_extractor_lib::models::{ExportFormat, SortDirection, SortKey};
use rusqlite::{params, Connection};

const NOTEPADS_JSON: &str = r#"{"notepads": {"a": {"name": "Groceries", "text": "milk and eggs"}, "b": {"name": "Release", "text": "ship v2 on friday"}}}"#;
const EMPTY_NOTEPADS_JSON: &str = r#"{"notepads": {}, "notepadDataVersion": 0}"#;

fn write_database(root: &Path, id: &str, rows: &[(&str, &str)]) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).expect("create workspace dir");
    let conn = Connection::open(dir.join("state.vscdb")).expect("open fixture");
    conn.execute("CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)", [])
        .expect("create table");
    for (key, value) in rows {
        conn.execute("INSERT INTO ItemTable (key, value) VALUES (?1, ?2)", params![key, value])
            .expect("insert row");
    }
}

fn fixture_workspace(root: &Path) {
    write_database(
        root,
        "ws1",
        &[
            ("notepadData", NOTEPADS_JSON),
            ("notepad.reactiveStorageId", NOTEPADS_JSON),
            ("editor.fontSize", "14"),
        ],
    );
    write_database(
        root,
        "ws2",
        &[("workbench.notes", "# Todo\nbuy a new keyboard"), ("short.text", "tiny")],
    );

    let corrupt = root.join("ws3");
    fs::create_dir_all(&corrupt).expect("create corrupt dir");
    fs::write(corrupt.join("state.vscdb"), b"this is not a sqlite database at all").expect("write corrupt");

    fs::create_dir_all(root.join("ws4")).expect("create empty dir");
    write_database(root, "ws5", &[("notepadData", EMPTY_NOTEPADS_JSON)]);
}

fn config_for(root: &Path) -> ExtractorConfig {
    ExtractorConfig {
        workspace_root: Some(root.to_path_buf()),
        ..ExtractorConfig::default()
    }
}

#[test]
fn scan_recovers_notes_across_databases() {
    let dir = tempfile::tempdir().expect("tempdir");
    fixture_workspace(dir.path());
    let config = config_for(dir.path());

    let findings = NoteLocator::new(config.clone()).scan_workspace(dir.path());
    let summary: Vec<(&str, &str, bool)> = findings
        .iter()
        .map(|finding| (finding.database.as_str(), finding.key.as_str(), finding.is_notepad))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("ws1", "notepadData", true),
            ("ws2", "workbench.notes", false),
            ("ws5", "notepadData", true),
        ]
    );
    assert_eq!(
        findings[0].content,
        "# Groceries\n\nmilk and eggs\n\n---\n\n# Release\n\nship v2 on friday"
    );

    let stats = locator::statistics(&findings);
    assert_eq!(stats.total_findings, 3);
    assert_eq!(stats.databases_with_findings, 3);
    assert_eq!(stats.key_patterns_found, vec!["notepadData", "workbench.notes"]);
}

#[test]
fn catalog_lists_titled_notes_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    fixture_workspace(dir.path());

    let report = catalog::scan(&config_for(dir.path()));
    assert!(report.diagnostic.is_none());

    let mut notes = report.notes.clone();
    catalog::sort_notes(&mut notes, SortKey::Title, SortDirection::Ascending);
    let listed: Vec<(&str, &str, &str)> = notes
        .iter()
        .map(|note| (note.title.as_str(), note.content.as_str(), note.database.as_str()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("Groceries", "milk and eggs", "ws1"),
            ("Release", "ship v2 on friday", "ws1"),
            ("Todo", "buy a new keyboard", "ws2"),
        ]
    );

    let filtered = catalog::filter_notes(&notes, "KEYBOARD");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].original_key, "workbench.notes");
}

#[test]
fn exports_and_report_are_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = dir.path().join("workspaceStorage");
    fixture_workspace(&workspace);
    let report = catalog::scan(&config_for(&workspace));

    let filtered = catalog::filter_notes(&report.notes, "release");
    let contents = export::render_notes(ExportFormat::Markdown, &filtered, Some("release"), Utc::now())
        .expect("render notes");
    let out = dir.path().join("exports").join("release.md");
    export::write_export(&out, &contents).expect("write export");
    let written = fs::read_to_string(&out).expect("read export");
    assert!(written.contains("**Notes exported:** 1"));
    assert!(written.contains("| Title | Release |"));
    assert!(written.contains("ship v2 on friday"));

    let findings_report = export::render_findings_report(&report.findings, Utc::now());
    assert!(findings_report.contains("Total findings: 3\n"));
    assert!(findings_report.contains("FINDING #1 (NOTEPAD)\nDatabase: ws1\n"));
    assert!(findings_report.contains("(workbench.notes)"));
}

#[test]
fn missing_workspace_yields_diagnostic_not_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = catalog::scan(&config_for(&dir.path().join("absent")));
    assert!(report.findings.is_empty());
    assert!(report.diagnostic.is_some());
}

#[test]
fn yaml_config_overrides_thresholds() {
    let dir = tempfile::tempdir().expect("tempdir");
    fixture_workspace(&dir.path().join("storage"));
    let config_path = dir.path().join("extractor.yaml");
    fs::write(
        &config_path,
        format!(
            "workspaceRoot: {}\nkeyPatterns: []\nknownKeys:\n  - notepadData\n",
            dir.path().join("storage").display()
        ),
    )
    .expect("write config");

    let config = ExtractorConfig::load(&config_path).expect("load config");
    assert_eq!(config.known_keys, vec!["notepadData"]);
    assert_eq!(config.database_filename, "state.vscdb");

    let report = catalog::scan(&config);
    let keys: Vec<&str> = report.findings.iter().map(|finding| finding.key.as_str()).collect();
    assert_eq!(keys, vec!["notepadData", "notepadData"]);
}
