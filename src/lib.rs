// lib.rs
// Schema and data export of relational databases into portable SQL scripts

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;

pub use config::ExportSelection;
pub use error::ExportError;
pub use export::exporter::{ExportOutcome, ExportSummary, ScriptExporter};
