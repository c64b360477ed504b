//! Core data types for the ingestion engine
//! Pure data structures with no I/O

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ingestion::error::EngineError;

/// Extension of the flat files in the raw area
pub const RAW_EXTENSION: &str = "csv";

/// Separator between tech stack name and table name in a raw file name
pub const NAME_SEPARATOR: char = '-';

/// Partitions that raw sources and stores are organized under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "analytics")]
    Analytics,
    #[serde(rename = "CRM")]
    Crm,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Analytics, Category::Crm];

    /// Directory name under the ordered area
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Analytics => "analytics",
            Category::Crm => "CRM",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::BadRequest(format!("unknown category '{}'", s)))
    }
}

/// A flat-file export waiting in the raw area, named by (tech stack, table)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSource {
    pub tech_stack: String,
    pub table: String,
}

impl RawSource {
    pub fn new(tech_stack: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            tech_stack: tech_stack.into(),
            table: table.into(),
        }
    }

    /// `{techStack}-{table}.csv`
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}.{}",
            self.tech_stack, NAME_SEPARATOR, self.table, RAW_EXTENSION
        )
    }

    /// `{raw_root}/{techStack}/{techStack}-{table}.csv`
    pub fn path(&self, raw_root: &Path) -> PathBuf {
        raw_root.join(&self.tech_stack).join(self.file_name())
    }

    /// Split a raw file name into its (tech stack, table) pair.
    /// Returns None unless the stem holds exactly one separator with text on both sides.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", RAW_EXTENSION))?;
        let mut parts = stem.split(NAME_SEPARATOR);
        let (tech_stack, table) = (parts.next()?, parts.next()?);
        if parts.next().is_some() || tech_stack.is_empty() || table.is_empty() {
            return None;
        }
        Some(Self::new(tech_stack, table))
    }
}

impl std::fmt::Display for RawSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tech_stack, self.table)
    }
}

/// A materialized table inside a per-(category, tech stack) store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedTable {
    pub category: Category,
    pub tech_stack: String,
    pub table: String,
}

impl OrderedTable {
    /// The raw source this table was integrated from
    pub fn source(&self) -> RawSource {
        RawSource::new(self.tech_stack.clone(), self.table.clone())
    }
}

/// Inferred column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared SQLite type back to a column type; anything not INTEGER reads as TEXT
    pub fn from_declared(declared: &str) -> Self {
        if declared.eq_ignore_ascii_case("INTEGER") {
            ColumnType::Integer
        } else {
            ColumnType::Text
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// Ordered (name, type) pairs; order matches the source file's columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Header plus equal-length rows, values kept as their source text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordSet {
    /// Values of one column, top to bottom
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(idx).map(String::as_str))
    }
}

/// A typed cell, as bound into or read out of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// Coerce source text to the column's type; empty INTEGER cells become NULL
    pub fn coerce(raw: &str, column_type: ColumnType) -> Option<Self> {
        match column_type {
            ColumnType::Integer if raw.is_empty() => Some(Value::Null),
            ColumnType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            ColumnType::Text => Some(Value::Text(raw.to_string())),
        }
    }
}

/// Comparison operators accepted by the query builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    pub fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// Structured predicate: `field op value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(default)]
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// Projection and filters for one SELECT; `attributes: None` means every column
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryRequest {
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

/// Rows returned by the query builder, values in `columns` order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationReport {
    FullyIntegrated,
    /// Sorted by tech stack then table
    Missing(Vec<RawSource>),
}

impl ReconciliationReport {
    pub fn is_fully_integrated(&self) -> bool {
        matches!(self, ReconciliationReport::FullyIntegrated)
    }

    pub fn missing(&self) -> &[RawSource] {
        match self {
            ReconciliationReport::FullyIntegrated => &[],
            ReconciliationReport::Missing(missing) => missing,
        }
    }
}

impl Serialize for ReconciliationReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("ReconciliationReport", 2)?;
        state.serialize_field("allIntegrated", &self.is_fully_integrated())?;
        state.serialize_field("missing", self.missing())?;
        state.end()
    }
}

/// Statistics for one completed integration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub source: RawSource,
    pub category: Category,
    pub columns: usize,
    pub rows: usize,
    pub integrated_at: DateTime<Utc>,
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}: columns: {}, rows: {}",
            self.source, self.category, self.columns, self.rows
        )
    }
}
