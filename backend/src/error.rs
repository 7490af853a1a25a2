//! Error types for the sales ETL transform stage.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`CsvError`] - Reading and decoding the raw export
//! - [`TransformError`] - Conditions that abort the transform
//! - [`SinkError`] - Writing the four output tables
//! - [`ConfigError`] - Invalid configuration
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Bad values inside the export are *not* errors: they are coerced to
//! missing, repaired, clamped or dropped, and counted in the
//! [`TransformReport`](crate::models::TransformReport).

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading the raw export.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the content.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Invalid CSV format.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors that abort the transform.
///
/// Everything else (unparseable dates, bad numbers, outliers, zero MSRP)
/// is absorbed and reported.
#[derive(Debug, Error)]
pub enum TransformError {
    /// No input table was supplied by the extraction stage.
    #[error("No input table provided for transformation")]
    NoInput,

    /// Transform configuration is unusable.
    #[error("Invalid transform configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while persisting the output tables.
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error.
    #[error("Sink IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("Sink CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Table could not be written.
    #[error("Failed to write table '{table}': {message}")]
    WriteFailed { table: String, message: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of its allowed range.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Returned by the extract → transform → load driver used by the CLI.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
