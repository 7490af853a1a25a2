//! Transformation module.
//!
//! Cleans one raw sales export and enriches it:
//! - Coerce: typed cells, calendar parts
//! - Impute: medians, `Unknown` sentinel, rows without a date dropped
//! - Outliers: IQR clamp on `unit_price`
//! - Metrics: `line_total`, `margin`, `margin_percentage`
//! - Pipeline: orchestration and the extract → transform → load driver

pub mod coerce;
pub mod impute;
pub mod metrics;
pub mod outliers;
pub mod pipeline;
pub mod stats;

pub use coerce::{coerce_table, CalendarParts, CoerceFailure, Coerced, CoercedTable, TypedRow};
pub use impute::{resolve_missing, CleanRow, ImputationReport};
pub use metrics::derive_metrics;
pub use outliers::{clamp_unit_price, IqrFences};
pub use pipeline::*;
