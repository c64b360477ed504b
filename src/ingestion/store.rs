//! Stores - one SQLite file per (category, tech stack), plus identifier quoting
//! and per-store locking

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::types::{Category, Column, ColumnSchema, ColumnType};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

pub const STORE_EXTENSION: &str = "db";

/// Identifies one store: `{ordered_root}/{category}/{techStack}/{techStack}.db`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub category: Category,
    pub tech_stack: String,
}

impl StoreKey {
    pub fn new(category: Category, tech_stack: impl Into<String>) -> Self {
        Self {
            category,
            tech_stack: tech_stack.into(),
        }
    }

    pub fn dir(&self, ordered_root: &Path) -> PathBuf {
        ordered_root
            .join(self.category.dir_name())
            .join(&self.tech_stack)
    }

    pub fn file(&self, ordered_root: &Path) -> PathBuf {
        self.dir(ordered_root)
            .join(format!("{}.{}", self.tech_stack, STORE_EXTENSION))
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.category, self.tech_stack)
    }
}

/// One reader/writer lock per store. Writers to a store exclude each other and its
/// readers; unrelated stores never contend.
#[derive(Debug, Default)]
pub struct StoreLocks {
    locks: Mutex<HashMap<StoreKey, Arc<RwLock<()>>>>,
}

impl StoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &StoreKey) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    pub async fn read(&self, key: &StoreKey) -> OwnedRwLockReadGuard<()> {
        self.lock_for(key).read_owned().await
    }

    pub async fn write(&self, key: &StoreKey) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(key).write_owned().await
    }
}

/// Open a store for writing, creating the file if needed
pub async fn open_for_write(path: &Path) -> Result<SqliteConnection> {
    let conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await?;
    Ok(conn)
}

/// Open an existing store without write access
pub async fn open_read_only(path: &Path) -> Result<SqliteConnection> {
    if !path.is_file() {
        return Err(EngineError::NotFound(format!("store {}", path.display())));
    }

    let conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await?;
    Ok(conn)
}

/// Names of every user table in a store, sorted
pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(conn)
    .await?;
    Ok(names)
}

/// Column schema of a table, or None if the table does not exist
pub async fn table_schema(conn: &mut SqliteConnection, table: &str) -> Result<Option<ColumnSchema>> {
    let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
        .bind(table)
        .fetch_all(conn)
        .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let columns = rows
        .iter()
        .map(|row| {
            Ok(Column {
                name: row.try_get::<String, _>("name")?,
                column_type: ColumnType::from_declared(&row.try_get::<String, _>("type")?),
            })
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

    Ok(Some(ColumnSchema::new(columns)))
}

/// Tech stack and table names double as path segments: ASCII letters, digits and underscores only
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.to_ascii_lowercase().starts_with("sqlite_");

    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote an identifier for interpolation into SQL. Rejects empty names and control
/// characters; embedded double quotes are doubled.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.trim().is_empty() || name.chars().any(char::is_control) {
        return Err(EngineError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
