//! Source reader - load a raw CSV export into a RecordSet

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::store::validate_name;
use crate::ingestion::types::{RawSource, RecordSet};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Locate and parse `{raw_root}/{techStack}/{techStack}-{table}.csv`
pub fn read_source(raw_root: &Path, source: &RawSource) -> Result<RecordSet> {
    // both names become path segments
    validate_name(&source.tech_stack)?;
    validate_name(&source.table)?;

    let path = source.path(raw_root);
    if !path.is_file() {
        return Err(EngineError::NotFound(format!(
            "raw file {}",
            path.display()
        )));
    }

    info!("Reading raw source {} from {:?}", source, path);
    let file = File::open(&path).map_err(|e| EngineError::io(&path, e))?;
    let records = parse_csv(file, &path)?;
    info!(
        "Read {} rows x {} columns from {}",
        records.rows.len(),
        records.headers.len(),
        source
    );

    Ok(records)
}

/// Parse comma-delimited text whose first row is the header
pub fn parse_csv<R: Read>(input: R, path: &Path) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(e, path))?
        .iter()
        .map(str::to_string)
        .collect();

    validate_headers(&headers, path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(e, path))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!("Parsed {} data rows from {:?}", rows.len(), path);

    Ok(RecordSet { headers, rows })
}

fn validate_headers(headers: &[String], path: &Path) -> Result<()> {
    if headers.is_empty() {
        return Err(parse_error(path, "missing header row"));
    }

    let mut seen = HashSet::new();
    for (idx, header) in headers.iter().enumerate() {
        if header.is_empty() {
            return Err(parse_error(path, &format!("header {} is empty", idx + 1)));
        }
        // SQLite column names ignore ASCII case
        if !seen.insert(header.to_ascii_lowercase()) {
            return Err(parse_error(path, &format!("duplicate header '{}'", header)));
        }
    }

    Ok(())
}

fn csv_error(err: csv::Error, path: &Path) -> EngineError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => EngineError::SchemaMismatch {
            row: pos.as_ref().map(|p| p.line() as usize).unwrap_or(0),
            expected: *expected_len as usize,
            found: *len as usize,
        },
        _ => parse_error(path, &err.to_string()),
    }
}

fn parse_error(path: &Path, message: &str) -> EngineError {
    EngineError::Parse {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
