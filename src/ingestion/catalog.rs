//! Catalog scanner - enumerate raw sources and materialized tables straight from disk

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::store::{self, StoreKey, StoreLocks};
use crate::ingestion::types::{Category, OrderedTable, RawSource};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Walk `{raw_root}/{techStack}/` and parse every `{techStack}-{table}.csv`.
///
/// Only names without exactly one `-` are skipped (with a warning). Names that cannot
/// be ingested as-is are still listed so they show up as missing. A missing raw area
/// is an error.
pub fn list_raw_sources(raw_root: &Path) -> Result<BTreeSet<RawSource>> {
    let mut sources = BTreeSet::new();

    for dir in read_dir(raw_root)? {
        let dir = dir.map_err(|e| EngineError::io(raw_root, e))?;
        if !dir.path().is_dir() {
            continue;
        }
        let dir_name = dir.file_name().to_string_lossy().into_owned();

        for entry in read_dir(&dir.path())? {
            let entry = entry.map_err(|e| EngineError::io(dir.path(), e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if path.extension().map_or(true, |ext| ext != "csv") {
                debug!("Ignoring non-CSV file {:?}", path);
                continue;
            }

            match RawSource::from_file_name(&file_name) {
                Some(source) => {
                    if source.tech_stack != dir_name {
                        warn!("Raw file {:?} is outside its tech stack directory", path);
                    }
                    sources.insert(source);
                }
                None => warn!("Skipping malformed raw file name {:?}", path),
            }
        }
    }

    Ok(sources)
}

/// Walk `{ordered_root}/{category}/{techStack}/{techStack}.db` and list every table.
///
/// A missing ordered area or a store directory without its file means no tables yet.
pub async fn list_ordered_tables(
    ordered_root: &Path,
    locks: &StoreLocks,
) -> Result<BTreeSet<OrderedTable>> {
    let mut tables = BTreeSet::new();
    if !ordered_root.is_dir() {
        debug!("Ordered area {:?} does not exist yet", ordered_root);
        return Ok(tables);
    }

    for key in store_keys(ordered_root)? {
        let file = key.file(ordered_root);
        if !file.is_file() {
            debug!("Store {} has no backing file yet", key);
            continue;
        }

        let _guard = locks.read(&key).await;
        let mut conn = store::open_read_only(&file).await?;
        for table in store::list_tables(&mut conn).await? {
            tables.insert(OrderedTable {
                category: key.category,
                tech_stack: key.tech_stack.clone(),
                table,
            });
        }
    }

    Ok(tables)
}

/// Every (category, tech stack) directory under the ordered area
fn store_keys(ordered_root: &Path) -> Result<Vec<StoreKey>> {
    let mut keys = Vec::new();

    for entry in read_dir(ordered_root)? {
        let entry = entry.map_err(|e| EngineError::io(ordered_root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(category) = Category::ALL.into_iter().find(|c| c.dir_name() == name) else {
            warn!("Skipping unknown category directory {:?}", entry.path());
            continue;
        };

        for stack in read_dir(&entry.path())? {
            let stack = stack.map_err(|e| EngineError::io(entry.path(), e))?;
            if stack.path().is_dir() {
                let tech_stack = stack.file_name().to_string_lossy().into_owned();
                keys.push(StoreKey::new(category, tech_stack));
            }
        }
    }

    keys.sort();
    Ok(keys)
}

fn read_dir(path: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            EngineError::NotFound(format!("directory {}", path.display()))
        }
        _ => EngineError::io(path, e),
    })
}
