use crate::errors::{AppError, AppResult};
use crate::models::{ColumnInfo, RawValue};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};

const DEBUG_SAMPLE_ROWS: usize = 10;
const DEBUG_INTERESTING_ROWS: usize = 5;
const DEBUG_KEY_WIDTH: usize = 50;

/// Read-only view over one workspace `state.vscdb` file.
///
/// Every accessor swallows its own failures: an unreadable table or a malformed row yields an
/// empty result and a warning, never an error. The connection closes when the value is dropped.
#[derive(Debug)]
pub struct StateDatabase {
    conn: Connection,
    db_path: PathBuf,
}

impl StateDatabase {
    pub fn open(path: &Path) -> AppResult<Self> {
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "database file {} does not exist",
                path.to_string_lossy()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Table names in `sqlite_master` order.
    pub fn tables(&self) -> Vec<String> {
        self.or_empty("list tables", self.try_tables())
    }

    pub fn keys(&self, table: &str) -> Vec<String> {
        self.or_empty("list keys", self.try_keys(table))
    }

    /// Exact-key lookup. Without a table, tables are tried in listing order and the first hit wins.
    pub fn get(&self, key: &str, table: Option<&str>) -> Option<RawValue> {
        let tables = match table {
            Some(table) => vec![table.to_string()],
            None => self.tables(),
        };
        for table in &tables {
            match self.try_get(key, table) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        path = %self.db_path.to_string_lossy(),
                        table = %table,
                        key = %key,
                        error = %error,
                        "value lookup failed"
                    );
                }
            }
        }
        None
    }

    /// `LIKE` search over keys, concatenated in table-then-row order. Duplicates across tables stay.
    pub fn search(&self, pattern: &str, table: Option<&str>) -> Vec<String> {
        let tables = match table {
            Some(table) => vec![table.to_string()],
            None => self.tables(),
        };
        let mut matches = Vec::new();
        for table in &tables {
            match self.try_search(pattern, table) {
                Ok(keys) => matches.extend(keys),
                Err(error) => {
                    tracing::warn!(
                        path = %self.db_path.to_string_lossy(),
                        table = %table,
                        pattern = %pattern,
                        error = %error,
                        "key search failed"
                    );
                }
            }
        }
        matches
    }

    pub fn table_info(&self, table: &str) -> Vec<ColumnInfo> {
        self.or_empty("read table info", self.try_table_info(table))
    }

    pub fn all_data(&self, table: &str, limit: Option<usize>) -> Vec<(String, RawValue)> {
        self.or_empty("read table rows", self.try_all_data(table, limit))
    }

    /// Multi-line summary of the file for troubleshooting a scan.
    pub fn debug_info(&self) -> String {
        let mut lines = vec![format!("Database: {}", self.db_path.to_string_lossy())];
        match fs::metadata(&self.db_path) {
            Ok(meta) => lines.push(format!("File size: {} bytes", meta.len())),
            Err(error) => lines.push(format!("File size: unavailable ({})", error)),
        }

        let tables = match self.try_tables() {
            Ok(tables) => tables,
            Err(error) => {
                lines.push(format!("Error getting debug info: {}", error));
                return lines.join("\n");
            }
        };
        lines.push(format!("Tables found: {}", tables.len()));

        for table in &tables {
            lines.push(String::new());
            lines.push(format!("[TABLE] {}", table));
            if let Err(error) = self.describe_table(table, &mut lines) {
                lines.push(format!("  Error: {}", error));
            }
        }
        lines.join("\n")
    }

    fn describe_table(&self, table: &str, lines: &mut Vec<String>) -> AppResult<()> {
        let columns: Vec<String> = self.try_table_info(table)?.into_iter().map(|column| column.name).collect();
        lines.push(format!("  Columns: [{}]", columns.join(", ")));

        let quoted = quote_identifier(table);
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quoted), [], |row| row.get(0))?;
        lines.push(format!("  Rows: {}", count));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT key, LENGTH(value) AS value_size FROM {} ORDER BY value_size DESC LIMIT ?1",
            quoted
        ))?;
        let mut rows = stmt.query(params![DEBUG_SAMPLE_ROWS as i64])?;
        lines.push("  Sample entries (largest first):".to_string());
        while let Some(row) = rows.next()? {
            let key = value_ref_to_key(row.get_ref(0)?).unwrap_or_default();
            let size: Option<i64> = row.get(1)?;
            lines.push(format!("    {} ({} bytes)", truncate_key(&key), size.unwrap_or(0)));
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT key FROM {} WHERE key LIKE '%note%' OR key LIKE '%text%' OR key LIKE '%draft%' LIMIT ?1",
            quoted
        ))?;
        let mut rows = stmt.query(params![DEBUG_INTERESTING_ROWS as i64])?;
        let mut interesting = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(key) = value_ref_to_key(row.get_ref(0)?) {
                interesting.push(key);
            }
        }
        if !interesting.is_empty() {
            lines.push("  Potentially interesting keys:".to_string());
            lines.extend(interesting.into_iter().map(|key| format!("    {}", key)));
        }
        Ok(())
    }

    fn try_tables(&self) -> AppResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    fn try_keys(&self, table: &str) -> AppResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT key FROM {}", quote_identifier(table)))?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(key) = value_ref_to_key(row.get_ref(0)?) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn try_get(&self, key: &str, table: &str) -> AppResult<Option<RawValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT value FROM {} WHERE key = ?1",
            quote_identifier(table)
        ))?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(value_ref_to_raw(row.get_ref(0)?))),
            None => Ok(None),
        }
    }

    fn try_search(&self, pattern: &str, table: &str) -> AppResult<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT key FROM {} WHERE key LIKE ?1",
            quote_identifier(table)
        ))?;
        let mut rows = stmt.query(params![pattern])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(key) = value_ref_to_key(row.get_ref(0)?) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn try_table_info(&self, table: &str) -> AppResult<Vec<ColumnInfo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
        let rows = stmt.query_map([], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                r#type: row.get(2)?,
                notnull: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                pk: row.get::<_, i64>(5)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    }

    fn try_all_data(&self, table: &str, limit: Option<usize>) -> AppResult<Vec<(String, RawValue)>> {
        let limit = limit.map(|value| value as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT key, value FROM {} LIMIT ?1",
            quote_identifier(table)
        ))?;
        let mut rows = stmt.query(params![limit])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let Some(key) = value_ref_to_key(row.get_ref(0)?) else {
                continue;
            };
            items.push((key, value_ref_to_raw(row.get_ref(1)?)));
        }
        Ok(items)
    }

    fn or_empty<T>(&self, operation: &str, result: AppResult<Vec<T>>) -> Vec<T> {
        result.unwrap_or_else(|error| {
            tracing::warn!(
                path = %self.db_path.to_string_lossy(),
                operation = %operation,
                error = %error,
                "database read failed; treating as empty"
            );
            Vec::new()
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn truncate_key(key: &str) -> String {
    if key.chars().count() > DEBUG_KEY_WIDTH {
        format!("{}...", key.chars().take(DEBUG_KEY_WIDTH).collect::<String>())
    } else {
        key.to_string()
    }
}

fn value_ref_to_key(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(number.to_string()),
        ValueRef::Real(number) => Some(number.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
    }
}

// Text that is not valid UTF-8 is handed over as bytes so the decoder can pick an encoding.
fn value_ref_to_raw(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Bytes(Vec::new()),
        ValueRef::Integer(number) => RawValue::Text(number.to_string()),
        ValueRef::Real(number) => RawValue::Text(number.to_string()),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => RawValue::Text(text.to_string()),
            Err(_) => RawValue::Bytes(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => RawValue::Bytes(bytes.to_vec()),
    }
}
