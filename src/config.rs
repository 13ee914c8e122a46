use crate::errors::{AppError, AppResult};
use crate::models::WorkspaceInfo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const WORKSPACE_ENV_VAR: &str = "NOTEPAD_EXTRACTOR_WORKSPACE";

const DEFAULT_KNOWN_KEYS: &[&str] = &[
    "notepadData",
    "notepad.reactiveStorageId",
    "reactiveStorageId",
    "notepad",
    "notes",
    "drafts",
];

const DEFAULT_KEY_PATTERNS: &[&str] = &[
    "%notepad%",
    "%reactive%",
    "%note%",
    "%draft%",
    "%text%",
    "%storage%",
];

const DEFAULT_SKIPPED_FIELDS: &[&str] = &[
    "selectedCommits",
    "selectedPullRequests",
    "selectedImages",
    "folderSelections",
    "fileSelections",
    "terminalSelections",
    "useLinterErrors",
    "useRules",
    "composers",
    "quotes",
];

/// Tunables for a scan. Every field has a default, so a partial config file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractorConfig {
    pub workspace_root: Option<PathBuf>,
    pub database_filename: String,
    pub default_table: String,
    pub known_keys: Vec<String>,
    pub key_patterns: Vec<String>,
    pub skipped_fields: Vec<String>,
    pub min_value_bytes: usize,
    pub min_content_chars: usize,
    pub substantial_content_chars: usize,
    pub max_inline_json_chars: usize,
    pub max_json_depth: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            database_filename: "state.vscdb".to_string(),
            default_table: "ItemTable".to_string(),
            known_keys: to_owned_list(DEFAULT_KNOWN_KEYS),
            key_patterns: to_owned_list(DEFAULT_KEY_PATTERNS),
            skipped_fields: to_owned_list(DEFAULT_SKIPPED_FIELDS),
            min_value_bytes: 10,
            min_content_chars: 5,
            substantial_content_chars: 10,
            max_inline_json_chars: 1000,
            max_json_depth: 64,
        }
    }
}

impl ExtractorConfig {
    /// Loads a config file. `.yaml`/`.yml` are read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|error| AppError::Config(format!("{}: {}", path.to_string_lossy(), error)))?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: Self = if is_yaml {
            serde_yaml::from_str(&raw)?
        } else {
            serde_json::from_str(&raw)
                .map_err(|error| AppError::Config(format!("{}: {}", path.to_string_lossy(), error)))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Layers the environment variable and an explicit override on top of the loaded value.
    pub fn with_overrides(mut self, workspace: Option<PathBuf>) -> Self {
        if let Some(from_env) = std::env::var_os(WORKSPACE_ENV_VAR).filter(|value| !value.is_empty()) {
            self.workspace_root = Some(PathBuf::from(from_env));
        }
        if let Some(workspace) = workspace {
            self.workspace_root = Some(workspace);
        }
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database_filename.trim().is_empty() {
            return Err(AppError::Config("databaseFilename cannot be empty".to_string()));
        }
        if self.max_json_depth == 0 {
            return Err(AppError::Config("maxJsonDepth must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(default_workspace_path)
    }

    /// The explicitly requested table, or `defaultTable` when none is given.
    pub fn table_or_default<'a>(&'a self, table: Option<&'a str>) -> &'a str {
        table
            .filter(|table| !table.trim().is_empty())
            .unwrap_or(self.default_table.as_str())
    }

    pub fn database_path(&self, root: &Path, database_id: &str) -> PathBuf {
        root.join(database_id).join(&self.database_filename)
    }

    /// Returns every `<root>/<dir>/<database_filename>`, sorted by path.
    pub fn database_files(&self, root: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %root.to_string_lossy(), error = %error, "workspace root is not readable");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let candidate = dir.join(&self.database_filename);
            if candidate.is_file() {
                files.push(candidate);
            }
        }
        files.sort();
        files
    }

    pub fn workspace_info(&self, root: &Path) -> WorkspaceInfo {
        let mut info = WorkspaceInfo {
            path: root.to_path_buf(),
            exists: root.exists(),
            accessible: false,
            database_count: 0,
            subdirectories: Vec::new(),
        };
        if !info.exists {
            return info;
        }

        match fs::read_dir(root) {
            Ok(entries) => {
                let mut subdirectories: Vec<String> = entries
                    .flatten()
                    .filter(|entry| entry.path().is_dir())
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .collect();
                subdirectories.sort();
                info.accessible = true;
                info.subdirectories = subdirectories;
                info.database_count = self.database_files(root).len();
            }
            Err(error) => {
                tracing::warn!(path = %root.to_string_lossy(), error = %error, "workspace root is not accessible");
            }
        }
        info
    }
}

/// `<config dir>/Cursor/User/workspaceStorage`, e.g. `%APPDATA%\Cursor\User\workspaceStorage`.
pub fn default_workspace_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Cursor")
        .join("User")
        .join("workspaceStorage")
}

pub fn validate_workspace_path(root: &Path) -> bool {
    root.is_dir()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
