//! Ingestion engine - type inference, table materialization and raw/ordered reconciliation

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod infer;
pub mod notify;
pub mod parse;
pub mod query;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod write;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use types::*;
