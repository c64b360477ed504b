//! Engine facade - the operations the request layer calls into

use crate::ingestion::catalog;
use crate::ingestion::config::EngineConfig;
use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::infer::infer_schema;
use crate::ingestion::parse::read_source;
use crate::ingestion::query::{self, projection_request};
use crate::ingestion::reconcile;
use crate::ingestion::store::StoreLocks;
use crate::ingestion::types::{
    Category, Filter, IngestStats, OrderedTable, QueryRequest, QueryRows, RawSource,
    ReconciliationReport,
};
use crate::ingestion::write::materialize;
use chrono::Utc;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Owns the configuration and the per-store locks; cheap to share behind an `Arc`
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    locks: StoreLocks,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            locks: StoreLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read, type and fully replace one ordered table, within the configured timeout
    pub async fn ingest(&self, source: &RawSource, category: Category) -> Result<IngestStats> {
        self.ingest_with_deadline(source, category, self.config.operation_timeout)
            .await
    }

    /// As `ingest`, aborting after `deadline`. An aborted run leaves the store as it was.
    pub async fn ingest_with_deadline(
        &self,
        source: &RawSource,
        category: Category,
        deadline: Duration,
    ) -> Result<IngestStats> {
        with_deadline("ingest", deadline, self.run_ingest(source, category))
            .await
            .map_err(|e| EngineError::integration(source, e))
    }

    async fn run_ingest(&self, source: &RawSource, category: Category) -> Result<IngestStats> {
        info!("Integrating {} as {}", source, category);

        let raw_root = self.config.raw_root.clone();
        let to_read = source.clone();
        let records =
            tokio::task::spawn_blocking(move || read_source(&raw_root, &to_read)).await??;

        let schema = infer_schema(&records);
        let rows = materialize(
            &self.config.ordered_root,
            &self.locks,
            source,
            category,
            &schema,
            &records,
        )
        .await?;

        let stats = IngestStats {
            source: source.clone(),
            category,
            columns: schema.len(),
            rows,
            integrated_at: Utc::now(),
        };
        info!("Integrated {}", stats);
        Ok(stats)
    }

    /// Scan both areas concurrently and diff them
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let (raw, ordered) = tokio::try_join!(self.scan_raw(), self.scan_ordered())?;
        Ok(reconcile::reconcile(&raw, &ordered))
    }

    /// Raw sources on disk, sorted
    pub async fn list_raw(&self) -> Result<Vec<RawSource>> {
        Ok(self.scan_raw().await?.into_iter().collect())
    }

    /// Materialized tables across every store, sorted
    pub async fn list_ordered(&self) -> Result<Vec<OrderedTable>> {
        Ok(self.scan_ordered().await?.into_iter().collect())
    }

    /// Project `attributes`, optionally filtered by a parallel list of equality values
    pub async fn query(
        &self,
        table: &str,
        tech_stack: &str,
        category: Category,
        attributes: &[String],
        equality_filters: &[Option<String>],
    ) -> Result<QueryRows> {
        let request = projection_request(attributes, equality_filters)?;
        self.select(table, tech_stack, category, &request).await
    }

    /// Every attribute, optionally restricted by structured filters
    pub async fn query_all(
        &self,
        table: &str,
        tech_stack: &str,
        category: Category,
        filters: Vec<Filter>,
    ) -> Result<QueryRows> {
        let request = QueryRequest {
            attributes: None,
            filters,
            limit: None,
        };
        self.select(table, tech_stack, category, &request).await
    }

    /// The single query primitive behind `query` and `query_all`
    pub async fn select(
        &self,
        table: &str,
        tech_stack: &str,
        category: Category,
        request: &QueryRequest,
    ) -> Result<QueryRows> {
        with_deadline(
            "query",
            self.config.operation_timeout,
            query::select(
                &self.config.ordered_root,
                &self.locks,
                category,
                tech_stack,
                table,
                request,
            ),
        )
        .await
    }

    async fn scan_raw(&self) -> Result<BTreeSet<RawSource>> {
        let raw_root = self.config.raw_root.clone();
        tokio::task::spawn_blocking(move || catalog::list_raw_sources(&raw_root)).await?
    }

    async fn scan_ordered(&self) -> Result<BTreeSet<OrderedTable>> {
        catalog::list_ordered_tables(&self.config.ordered_root, &self.locks).await
    }
}

async fn with_deadline<T>(
    operation: &'static str,
    deadline: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| EngineError::Timeout {
            operation,
            after: deadline,
        })?
}
