//! Persistence of the four output tables.
//!
//! The relational load lives outside this crate; what it needs is the
//! contract below. A [`Sink`] receives the whole [`TransformOutput`] and
//! either persists all four tables or none of them, then records one
//! `etl_metadata` entry per run.
//!
//! [`CsvSnapshotSink`] writes processed snapshots to a directory:
//!
//! ```text
//! <dir>/sales_data.csv
//! <dir>/customer_aggregations.csv
//! <dir>/product_aggregations.csv
//! <dir>/time_aggregations.csv
//! <dir>/etl_metadata.csv          (appended, one row per run)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{SinkError, SinkResult};
use crate::models::{SalesRecord, TransformOutput, SALES_COLUMNS};

pub const SALES_TABLE: &str = "sales_data";
pub const CUSTOMER_TABLE: &str = "customer_aggregations";
pub const PRODUCT_TABLE: &str = "product_aggregations";
pub const TIME_TABLE: &str = "time_aggregations";
pub const METADATA_TABLE: &str = "etl_metadata";

const CUSTOMER_COLUMNS: &[&str] = &[
    "customer_name",
    "total_orders",
    "total_sales",
    "total_quantity",
    "first_order",
    "last_order",
    "customer_lifetime_days",
];

const PRODUCT_COLUMNS: &[&str] = &[
    "product_code",
    "total_quantity",
    "total_revenue",
    "order_count",
    "customer_count",
];

const TIME_COLUMNS: &[&str] = &[
    "year",
    "month",
    "total_sales",
    "order_count",
    "customer_count",
    "total_quantity",
];

const METADATA_COLUMNS: &[&str] = &["run_id", "load_timestamp", "rows_loaded", "source"];

const TABLES: [&str; 4] = [SALES_TABLE, CUSTOMER_TABLE, PRODUCT_TABLE, TIME_TABLE];

/// One row of the `etl_metadata` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlMetadata {
    pub run_id: Uuid,
    pub load_timestamp: DateTime<Utc>,
    /// Rows written to `sales_data`
    pub rows_loaded: usize,
    pub source: String,
}

impl EtlMetadata {
    pub fn new(rows_loaded: usize, source: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            load_timestamp: Utc::now(),
            rows_loaded,
            source: source.to_string(),
        }
    }
}

/// Destination for a completed transform.
pub trait Sink {
    /// Replace the four tables with `output` and record the run.
    ///
    /// On error no table may be left partially replaced.
    fn load(&mut self, output: &TransformOutput, source: &str) -> SinkResult<EtlMetadata>;
}

/// Keeps every load in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub loads: Vec<(EtlMetadata, TransformOutput)>,
}

impl Sink for MemorySink {
    fn load(&mut self, output: &TransformOutput, source: &str) -> SinkResult<EtlMetadata> {
        let metadata = EtlMetadata::new(output.sales.len(), source);
        self.loads.push((metadata.clone(), output.clone()));
        Ok(metadata)
    }
}

/// Writes each table to `<dir>/<table>.csv`, truncate-and-reload.
#[derive(Debug, Clone)]
pub struct CsvSnapshotSink {
    dir: PathBuf,
}

impl CsvSnapshotSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of a table.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    fn temp_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!(".{}.csv.tmp", table))
    }

    fn write_tables(&self, output: &TransformOutput) -> SinkResult<()> {
        write_sales(&self.temp_path(SALES_TABLE), output)?;
        write_serialized(&self.temp_path(CUSTOMER_TABLE), CUSTOMER_COLUMNS, &output.customers)?;
        write_serialized(&self.temp_path(PRODUCT_TABLE), PRODUCT_COLUMNS, &output.products)?;
        write_serialized(&self.temp_path(TIME_TABLE), TIME_COLUMNS, &output.time)?;
        Ok(())
    }

    fn backup_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!(".{}.csv.bak", table))
    }

    fn discard_temps(&self) {
        for table in TABLES {
            let _ = fs::remove_file(self.temp_path(table));
        }
    }

    /// Move the written temp files into place.
    ///
    /// Each previous table is first moved to a backup. If any step fails,
    /// every table already touched goes back to its previous state (or is
    /// removed when it did not exist before) and the error is returned.
    fn swap_in(&self) -> SinkResult<()> {
        for table in TABLES {
            let _ = fs::remove_file(self.backup_path(table));
        }

        let mut touched: Vec<(&str, bool)> = Vec::new();
        for table in TABLES {
            let final_path = self.table_path(table);
            let existed = final_path.exists();
            if existed {
                if let Err(e) = fs::rename(&final_path, self.backup_path(table)) {
                    return Err(self.roll_back(&touched, table, e));
                }
            }
            touched.push((table, existed));
            if let Err(e) = fs::rename(self.temp_path(table), &final_path) {
                return Err(self.roll_back(&touched, table, e));
            }
        }

        for (table, existed) in touched {
            if existed {
                let _ = fs::remove_file(self.backup_path(table));
            }
        }
        Ok(())
    }

    fn roll_back(&self, touched: &[(&str, bool)], failed: &str, error: std::io::Error) -> SinkError {
        for &(table, existed) in touched {
            if existed {
                let _ = fs::rename(self.backup_path(table), self.table_path(table));
            } else {
                let _ = fs::remove_file(self.table_path(table));
            }
        }
        self.discard_temps();
        SinkError::WriteFailed {
            table: failed.to_string(),
            message: error.to_string(),
        }
    }

    fn append_metadata(&self, metadata: &EtlMetadata) -> SinkResult<()> {
        let path = self.table_path(METADATA_TABLE);
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(METADATA_COLUMNS)?;
        }
        writer.serialize(metadata)?;
        writer.flush()?;
        Ok(())
    }
}

impl Sink for CsvSnapshotSink {
    fn load(&mut self, output: &TransformOutput, source: &str) -> SinkResult<EtlMetadata> {
        fs::create_dir_all(&self.dir)?;

        if let Err(e) = self.write_tables(output) {
            self.discard_temps();
            return Err(e);
        }
        self.swap_in()?;

        let metadata = EtlMetadata::new(output.sales.len(), source);
        self.append_metadata(&metadata)?;
        Ok(metadata)
    }
}

fn write_serialized<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> SinkResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_sales(path: &Path, output: &TransformOutput) -> SinkResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    let header: Vec<&str> = SALES_COLUMNS
        .iter()
        .copied()
        .chain(output.passthrough_columns.iter().map(String::as_str))
        .collect();
    writer.write_record(&header)?;
    for record in &output.sales {
        writer.write_record(sales_fields(record))?;
    }
    writer.flush()?;
    Ok(())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render a sales record in `sales_data` column order; nulls are empty cells.
pub fn sales_fields(r: &SalesRecord) -> Vec<String> {
    let mut fields = vec![
        opt(r.order_number),
        opt(r.line_number),
        r.order_date.format("%Y-%m-%d").to_string(),
        r.quantity.to_string(),
        r.unit_price.to_string(),
        opt(r.suggested_retail_price),
        r.product_line.clone(),
        r.product_code.clone(),
        r.customer_name.clone(),
        r.city.clone(),
        r.state.clone(),
        r.country.clone(),
        r.deal_size.clone(),
        opt(r.year),
        opt(r.month),
        opt(r.quarter),
        r.order_year.to_string(),
        r.order_month.to_string(),
        r.order_day.to_string(),
        r.order_quarter.to_string(),
        r.order_day_of_week.to_string(),
        r.line_total.to_string(),
        opt(r.margin),
        opt(r.margin_percentage),
    ];
    fields.extend(r.passthrough.iter().map(|v| v.clone().unwrap_or_default()));
    fields
}
