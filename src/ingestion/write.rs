//! Write functions - replace an ordered table with freshly typed rows

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::store::{self, quote_identifier, validate_name, StoreKey, StoreLocks};
use crate::ingestion::types::{Category, ColumnSchema, RawSource, RecordSet, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::Connection;
use std::path::Path;
use tracing::{debug, info, warn};

/// Drop, recreate and bulk-load one table inside a single transaction.
///
/// The store directory and file are created on first use. Nothing becomes visible to
/// readers until commit; on error, or if the future is dropped mid-way, the transaction
/// rolls back and the previous table survives untouched.
pub async fn materialize(
    ordered_root: &Path,
    locks: &StoreLocks,
    source: &RawSource,
    category: Category,
    schema: &ColumnSchema,
    records: &RecordSet,
) -> Result<usize> {
    validate_name(&source.tech_stack)?;
    validate_name(&source.table)?;
    if schema.is_empty() {
        return Err(EngineError::BadRequest(format!(
            "{} has no columns",
            source
        )));
    }

    let typed_rows = type_rows(schema, records)?;
    let create_sql = create_table_sql(&source.table, schema)?;
    let insert_sql = insert_sql(&source.table, schema)?;
    let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(&source.table)?);

    let key = StoreKey::new(category, source.tech_stack.clone());
    let _guard = locks.write(&key).await;

    let dir = key.dir(ordered_root);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| EngineError::io(&dir, e))?;

    let mut conn = store::open_for_write(&key.file(ordered_root)).await?;
    let mut tx = conn.begin().await?;

    let loaded = async {
        let clash: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE AND name <> ?",
        )
        .bind(&source.table)
        .bind(&source.table)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = clash {
            return Err(EngineError::TableConflict {
                store: key.to_string(),
                table: source.table.clone(),
                existing,
            });
        }

        sqlx::query(&drop_sql).execute(&mut *tx).await?;
        sqlx::query(&create_sql).execute(&mut *tx).await?;
        debug!("Created table {} in store {}", source.table, key);

        for row in &typed_rows {
            let mut query = sqlx::query(&insert_sql);
            for value in row {
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await?;
        }
        Ok::<_, EngineError>(())
    }
    .await;

    if let Err(e) = loaded {
        if let Err(rollback) = tx.rollback().await {
            warn!("Rollback of {} in store {} failed: {}", source.table, key, rollback);
        }
        return Err(e);
    }

    tx.commit().await?;
    // committed: the table is replaced whatever happens to the connection now
    if let Err(e) = conn.close().await {
        warn!("Closing store {} after commit failed: {}", key, e);
    }
    info!(
        "Materialized {} rows into {} ({} columns)",
        typed_rows.len(),
        key,
        schema.len()
    );

    Ok(typed_rows.len())
}

/// Check arity and coerce every cell to its column type before any store is touched
fn type_rows(schema: &ColumnSchema, records: &RecordSet) -> Result<Vec<Vec<Value>>> {
    if records.headers.len() != schema.len() {
        return Err(EngineError::SchemaMismatch {
            row: 1,
            expected: schema.len(),
            found: records.headers.len(),
        });
    }

    records
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            // +2: one-based, after the header line
            let line = idx + 2;
            if row.len() != schema.len() {
                return Err(EngineError::SchemaMismatch {
                    row: line,
                    expected: schema.len(),
                    found: row.len(),
                });
            }

            row.iter()
                .zip(&schema.columns)
                .map(|(raw, column)| {
                    Value::coerce(raw, column.column_type).ok_or_else(|| {
                        EngineError::BadRequest(format!(
                            "row {}: '{}' is not a valid {} for column '{}'",
                            line, raw, column.column_type, column.name
                        ))
                    })
                })
                .collect()
        })
        .collect()
}

pub(crate) fn create_table_sql(table: &str, schema: &ColumnSchema) -> Result<String> {
    let columns = schema
        .columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_identifier(&c.name)?, c.column_type.sql_type())))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table)?,
        columns.join(", ")
    ))
}

pub(crate) fn insert_sql(table: &str, schema: &ColumnSchema) -> Result<String> {
    let columns = schema
        .names()
        .map(quote_identifier)
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()];

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table)?,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(i) => query.bind(*i),
        Value::Text(s) => query.bind(s.as_str()),
    }
}
