//! Engine configuration - data area locations and limits, injected at construction

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingestion::error::{EngineError, Result};
use crate::ingestion::types::Category;

const DEFAULT_RAW_DATA_PATH: &str = "../Data/rawData";
const DEFAULT_ORDERED_DATA_PATH: &str = "../Data/orderedData";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Locations of the raw and ordered areas plus per-operation limits
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub raw_root: PathBuf,
    pub ordered_root: PathBuf,
    pub operation_timeout: Duration,
    /// Externally supplied category for each tech stack, used when bootstrapping
    pub categories: BTreeMap<String, Category>,
}

impl EngineConfig {
    pub fn new(raw_root: impl Into<PathBuf>, ordered_root: impl Into<PathBuf>) -> Self {
        Self {
            raw_root: raw_root.into(),
            ordered_root: ordered_root.into(),
            operation_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            categories: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_category(mut self, tech_stack: impl Into<String>, category: Category) -> Self {
        self.categories.insert(tech_stack.into(), category);
        self
    }

    pub fn category_for(&self, tech_stack: &str) -> Option<Category> {
        self.categories.get(tech_stack).copied()
    }

    /// Load from environment variables (after `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let timeout_secs = match env::var("OPERATION_TIMEOUT_SECS") {
            Ok(s) => s.parse::<u64>().map_err(|_| {
                EngineError::Config("OPERATION_TIMEOUT_SECS must be a whole number".to_string())
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let categories = match env::var("TECH_STACK_CATEGORIES") {
            Ok(s) => parse_categories(&s)?,
            Err(_) => BTreeMap::new(),
        };

        Ok(EngineConfig {
            raw_root: env::var("RAW_DATA_PATH")
                .unwrap_or_else(|_| DEFAULT_RAW_DATA_PATH.to_string())
                .into(),
            ordered_root: env::var("ORDERED_DATA_PATH")
                .unwrap_or_else(|_| DEFAULT_ORDERED_DATA_PATH.to_string())
                .into(),
            operation_timeout: Duration::from_secs(timeout_secs),
            categories,
        })
    }
}

/// Parse `hubSpot=CRM,googleAnalytics4=analytics`
pub fn parse_categories(s: &str) -> Result<BTreeMap<String, Category>> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (tech_stack, category) = entry.split_once('=').ok_or_else(|| {
                EngineError::Config(format!(
                    "expected techStack=category in TECH_STACK_CATEGORIES, got '{}'",
                    entry
                ))
            })?;
            let category = category
                .parse::<Category>()
                .map_err(|e| EngineError::Config(e.to_string()))?;
            Ok((tech_stack.trim().to_string(), category))
        })
        .collect()
}
