// Library module for testable functions

pub mod ingestion;

pub use ingestion::{Engine, EngineConfig, EngineError};
