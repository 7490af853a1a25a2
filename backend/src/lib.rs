//! # Sales ETL - transform stage for retail sales exports
//!
//! Cleans a raw sales export (one row per order line), enriches it with
//! calendar parts and financial metrics, and builds three aggregates for
//! analytical queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│    Transform     │────▶│    Sink     │
//! │ (UTF8/1252) │     │  (auto-enc) │     │ (clean+aggregate)│     │ (4 tables)  │
//! └─────────────┘     └─────────────┘     └──────────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sales_etl::{transform_csv, TransformConfig};
//!
//! let run = transform_csv("sales_data_sample.csv".as_ref(), &TransformConfig::default()).unwrap();
//! println!("{} customers", run.output.customers.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Broadcast progress log
//! - [`config`] - Transform and sink configuration
//! - [`schema`] - Canonical columns and header normalization
//! - [`models`] - Raw table, cleaned rows, aggregates, report
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Cleaning, enrichment and the pipeline
//! - [`aggregate`] - Customer, product and monthly aggregates
//! - [`validation`] - Consistency checks over the output
//! - [`sink`] - Persistence of the output tables

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;
pub mod schema;

// Parsing
pub mod parser;

// Transformation
pub mod aggregate;
pub mod transform;

// Validation
pub mod validation;

// Persistence
pub mod sink;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    PipelineError,
    PipelineResult,
    SinkError,
    TransformError,
    TransformResult,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{SinkConfig, TransformConfig};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CustomerAggregate,
    OutlierReport,
    ProductAggregate,
    RawTable,
    SalesRecord,
    Summary,
    TimeAggregate,
    TransformOutput,
    TransformReport,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv_file_auto,
    parse_str,
    ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    format_delimiter,
    run_etl,
    transform_bytes,
    transform_csv,
    transform_data,
    CsvInfo,
    PipelineRun,
};

// =============================================================================
// Re-exports - Sink
// =============================================================================

pub use sink::{CsvSnapshotSink, EtlMetadata, MemorySink, Sink};
