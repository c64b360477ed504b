//! Reconciler - which raw sources have no ordered table yet

use crate::ingestion::types::{OrderedTable, RawSource, ReconciliationReport};
use std::collections::BTreeSet;
use tracing::info;

/// `raw - {(techStack, table) of every ordered table}`, by exact pair equality.
/// Category plays no part in the comparison.
pub fn reconcile(
    raw: &BTreeSet<RawSource>,
    ordered: &BTreeSet<OrderedTable>,
) -> ReconciliationReport {
    let integrated: BTreeSet<RawSource> = ordered.iter().map(OrderedTable::source).collect();

    // BTreeSet iteration keeps the report sorted by tech stack, then table
    let missing: Vec<RawSource> = raw.difference(&integrated).cloned().collect();

    if missing.is_empty() {
        info!("All {} raw sources are integrated", raw.len());
        ReconciliationReport::FullyIntegrated
    } else {
        info!(
            "{} of {} raw sources are not integrated",
            missing.len(),
            raw.len()
        );
        ReconciliationReport::Missing(missing)
    }
}
