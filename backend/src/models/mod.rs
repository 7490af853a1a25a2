//! Domain models for the sales transform.
//!
//! This module contains the tables flowing in and out of the transform:
//!
//! - [`RawTable`] - Untyped rows as produced by the extraction stage
//! - [`SalesRecord`] - One cleaned and enriched order line
//! - [`CustomerAggregate`] - Totals per customer
//! - [`ProductAggregate`] - Totals per product code
//! - [`TimeAggregate`] - Totals per (year, month)
//! - [`TransformOutput`] - The four tables plus the [`TransformReport`]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// =============================================================================
// Raw input
// =============================================================================

/// Untyped table: named columns, every cell a string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string slices, mostly for tests and fixtures.
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Cleaned rows
// =============================================================================

/// Column names of the `sales_data` table, before pass-through columns.
pub const SALES_COLUMNS: &[&str] = &[
    "order_number",
    "line_number",
    "order_date",
    "quantity",
    "unit_price",
    "suggested_retail_price",
    "product_line",
    "product_code",
    "customer_name",
    "city",
    "state",
    "country",
    "deal_size",
    "year",
    "month",
    "quarter",
    "order_year",
    "order_month",
    "order_day",
    "order_quarter",
    "order_day_of_week",
    "line_total",
    "margin",
    "margin_percentage",
];

/// One order line after cleaning and enrichment.
///
/// `line_total`, `margin` and `margin_percentage` are always computed from
/// the cleaned `quantity`, `unit_price` and `suggested_retail_price`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub order_number: Option<i64>,
    pub line_number: Option<i64>,
    pub order_date: NaiveDate,
    pub quantity: i64,
    pub unit_price: f64,
    pub suggested_retail_price: Option<f64>,
    pub product_line: String,
    pub product_code: String,
    pub customer_name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub deal_size: String,
    /// Year as supplied by the export (`YEAR_ID`)
    pub year: Option<i32>,
    /// Month as supplied by the export (`MONTH_ID`)
    pub month: Option<u32>,
    /// Quarter as supplied by the export (`QTR_ID`)
    pub quarter: Option<u32>,
    pub order_year: i32,
    pub order_month: u32,
    pub order_day: u32,
    pub order_quarter: u32,
    /// Monday = 0
    pub order_day_of_week: u32,
    pub line_total: f64,
    /// `None` when the suggested retail price is missing
    pub margin: Option<f64>,
    /// `None` when the suggested retail price is missing or zero
    pub margin_percentage: Option<f64>,
    /// Values of the pass-through columns, aligned with
    /// [`TransformOutput::passthrough_columns`]
    #[serde(skip)]
    pub passthrough: Vec<Option<String>>,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Totals for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub customer_name: String,
    /// Distinct order numbers
    pub total_orders: u64,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub first_order: NaiveDate,
    pub last_order: NaiveDate,
    pub customer_lifetime_days: i64,
}

/// Totals for one product code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub product_code: String,
    pub total_quantity: i64,
    pub total_revenue: f64,
    /// Distinct order numbers
    pub order_count: u64,
    /// Distinct customer names
    pub customer_count: u64,
}

/// Totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAggregate {
    pub year: i32,
    pub month: u32,
    pub total_sales: f64,
    pub order_count: u64,
    pub customer_count: u64,
    pub total_quantity: i64,
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of the IQR clamp on `unit_price`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub clamped: usize,
}

/// Side-channel account of everything the transform absorbed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformReport {
    pub input_rows: usize,
    pub output_rows: usize,
    /// (raw header, canonical name) for every header that changed
    pub renamed_columns: Vec<(String, String)>,
    /// Canonical columns absent from the input
    pub missing_columns: Vec<String>,
    /// Non-empty values that failed to parse, per column
    pub coercion_failures: BTreeMap<String, usize>,
    /// Missing values per column after coercion, before repair
    pub missing_values: BTreeMap<String, usize>,
    /// Values filled by the missing-value resolver, per column
    pub repaired_values: BTreeMap<String, usize>,
    /// Medians used to fill numeric columns
    pub medians: BTreeMap<String, f64>,
    /// Rows removed because `order_date` was missing or unparseable
    pub dropped_rows: usize,
    pub outliers: OutlierReport,
    /// Rows whose margin percentage is undefined (zero suggested retail price)
    pub zero_msrp_rows: usize,
    /// Data-quality warnings; never fatal
    pub warnings: Vec<String>,
}

/// The four tables produced by one transform run, plus its report.
///
/// The tables are mutually consistent snapshots of a single input and are
/// handed to the load stage as one unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformOutput {
    pub sales: Vec<SalesRecord>,
    /// Names of the columns carried through without interpretation
    pub passthrough_columns: Vec<String>,
    pub customers: Vec<CustomerAggregate>,
    pub products: Vec<ProductAggregate>,
    pub time: Vec<TimeAggregate>,
    pub report: TransformReport,
}

// =============================================================================
// Summary
// =============================================================================

/// Headline figures of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_orders: usize,
    pub total_customers: usize,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub total_revenue: f64,
    pub top_customers: Vec<CustomerAggregate>,
    pub top_products: Vec<ProductAggregate>,
}

impl TransformOutput {
    /// Compute headline figures with the `top_n` best customers and products.
    pub fn summary(&self, top_n: usize) -> Summary {
        let total_orders = self
            .sales
            .iter()
            .filter_map(|r| r.order_number)
            .collect::<HashSet<_>>()
            .len();
        let total_customers = self
            .sales
            .iter()
            .map(|r| r.customer_name.as_str())
            .collect::<HashSet<_>>()
            .len();

        let mut top_customers = self.customers.clone();
        top_customers.sort_by(|a, b| {
            b.total_sales
                .total_cmp(&a.total_sales)
                .then_with(|| a.customer_name.cmp(&b.customer_name))
        });
        top_customers.truncate(top_n);

        let mut top_products = self.products.clone();
        top_products.sort_by(|a, b| {
            b.total_revenue
                .total_cmp(&a.total_revenue)
                .then_with(|| a.product_code.cmp(&b.product_code))
        });
        top_products.truncate(top_n);

        Summary {
            total_orders,
            total_customers,
            period_start: self.sales.iter().map(|r| r.order_date).min(),
            period_end: self.sales.iter().map(|r| r.order_date).max(),
            total_revenue: self.sales.iter().map(|r| r.line_total).sum(),
            top_customers,
            top_products,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(name: &str, sales: f64) -> CustomerAggregate {
        let day = NaiveDate::from_ymd_opt(2003, 1, 1).unwrap();
        CustomerAggregate {
            customer_name: name.into(),
            total_orders: 1,
            total_sales: sales,
            total_quantity: 1,
            first_order: day,
            last_order: day,
            customer_lifetime_days: 0,
        }
    }

    #[test]
    fn test_raw_table_from_rows() {
        let table = RawTable::from_rows(&["a", "b"], &[&["1", "2"], &["3", "4"]]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][0], "3");
    }

    #[test]
    fn test_summary_ranks_customers() {
        let output = TransformOutput {
            customers: vec![customer("Low", 10.0), customer("High", 500.0), customer("Mid", 80.0)],
            ..Default::default()
        };

        let summary = output.summary(2);
        let names: Vec<_> = summary.top_customers.iter().map(|c| c.customer_name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid"]);
        assert!(summary.period_start.is_none());
    }
}
