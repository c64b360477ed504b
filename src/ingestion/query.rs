//! Query builder - bounded SELECTs with projection and parameter-bound filters

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::store::{self, quote_identifier, validate_name, StoreKey, StoreLocks};
use crate::ingestion::types::{
    Category, ColumnSchema, ColumnType, Filter, FilterOp, QueryRequest, QueryRows, Value,
};
use crate::ingestion::write::bind_value;
use sqlx::Row;
use std::path::Path;
use tracing::debug;

/// Upper bound on rows returned by a single query
pub const DEFAULT_ROW_LIMIT: usize = 10_000;

/// A SELECT ready to run: SQL text with `?` placeholders plus the values to bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub columns: Vec<String>,
    pub column_types: Vec<ColumnType>,
}

/// Turn the parallel `(attributes, equality filters)` form into a request.
///
/// An empty filter list means no filtering; otherwise it must line up with the
/// attributes, and a `None` slot places no constraint on that attribute.
pub fn projection_request(
    attributes: &[String],
    equality_filters: &[Option<String>],
) -> Result<QueryRequest> {
    if attributes.is_empty() {
        return Err(EngineError::BadRequest(
            "at least one attribute is required".to_string(),
        ));
    }
    if !equality_filters.is_empty() && equality_filters.len() != attributes.len() {
        return Err(EngineError::BadRequest(format!(
            "{} filters supplied for {} attributes",
            equality_filters.len(),
            attributes.len()
        )));
    }

    let filters = attributes
        .iter()
        .zip(equality_filters)
        .filter_map(|(attribute, filter)| {
            filter
                .as_ref()
                .map(|value| Filter::eq(attribute.clone(), Value::Text(value.clone())))
        })
        .collect();

    Ok(QueryRequest {
        attributes: Some(attributes.to_vec()),
        filters,
        limit: None,
    })
}

/// Build the SELECT for a table with a known schema
pub fn build_select(table: &str, schema: &ColumnSchema, request: &QueryRequest) -> Result<BuiltQuery> {
    let columns: Vec<String> = match &request.attributes {
        Some(attributes) if attributes.is_empty() => {
            return Err(EngineError::BadRequest(
                "at least one attribute is required".to_string(),
            ))
        }
        Some(attributes) => attributes.clone(),
        None => schema.names().map(str::to_string).collect(),
    };

    let column_types = columns
        .iter()
        .map(|name| column_type(schema, name))
        .collect::<Result<Vec<_>>>()?;

    let projection = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Result<Vec<_>>>()?;

    let mut sql = format!(
        "SELECT {} FROM {}",
        projection.join(", "),
        quote_identifier(table)?
    );

    let mut predicates = Vec::new();
    let mut params = Vec::new();
    for filter in &request.filters {
        let field_type = column_type(schema, &filter.field)?;
        let field = quote_identifier(&filter.field)?;

        match (&filter.value, filter.op) {
            (Value::Null, FilterOp::Eq) => predicates.push(format!("{} IS NULL", field)),
            (Value::Null, FilterOp::Ne) => predicates.push(format!("{} IS NOT NULL", field)),
            (Value::Null, op) => {
                return Err(EngineError::BadRequest(format!(
                    "operator {:?} cannot compare against null",
                    op
                )))
            }
            (value, op) => {
                predicates.push(format!("{} {} ?", field, op.sql()));
                params.push(typed_param(value, field_type));
            }
        }
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    let limit = request.limit.unwrap_or(DEFAULT_ROW_LIMIT).min(DEFAULT_ROW_LIMIT);
    sql.push_str(" ORDER BY rowid LIMIT ?");
    params.push(Value::Integer(limit as i64));

    Ok(BuiltQuery {
        sql,
        params,
        columns,
        column_types,
    })
}

fn column_type(schema: &ColumnSchema, name: &str) -> Result<ColumnType> {
    schema
        .get(name)
        .map(|c| c.column_type)
        .ok_or_else(|| EngineError::Query(format!("unknown attribute '{}'", name)))
}

/// Text filter values aimed at INTEGER columns bind as integers when they parse
fn typed_param(value: &Value, column_type: ColumnType) -> Value {
    match (value, column_type) {
        (Value::Text(s), ColumnType::Integer) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

/// Run a request against `{category}/{techStack}` table `table`
pub async fn select(
    ordered_root: &Path,
    locks: &StoreLocks,
    category: Category,
    tech_stack: &str,
    table: &str,
    request: &QueryRequest,
) -> Result<QueryRows> {
    validate_name(tech_stack)?;
    validate_name(table)?;

    let key = StoreKey::new(category, tech_stack);
    let _guard = locks.read(&key).await;

    let mut conn = store::open_read_only(&key.file(ordered_root)).await?;
    let schema = store::table_schema(&mut conn, table)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("table {} in store {}", table, key)))?;

    let built = build_select(table, &schema, request)?;
    debug!("Running query on {}: {}", key, built.sql);

    let mut query = sqlx::query(&built.sql);
    for param in &built.params {
        query = bind_value(query, param);
    }
    let rows = query.fetch_all(&mut conn).await?;

    let rows = rows
        .iter()
        .map(|row| {
            built
                .column_types
                .iter()
                .enumerate()
                .map(|(idx, column_type)| read_value(row, idx, *column_type))
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

    Ok(QueryRows {
        columns: built.columns,
        rows,
    })
}

fn read_value(
    row: &sqlx::sqlite::SqliteRow,
    idx: usize,
    column_type: ColumnType,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match column_type {
        ColumnType::Integer => row.try_get::<Option<i64>, _>(idx)?.map(Value::Integer),
        ColumnType::Text => row.try_get::<Option<String>, _>(idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
