//! Missing-value resolver.
//!
//! Applies the repair policy in a fixed order:
//!
//! 1. `quantity`, `unit_price`: missing → median of the non-missing values,
//!    computed once before any value of the column is filled (0 when the
//!    column has no value at all).
//! 2. Categorical columns: missing → the unknown sentinel.
//! 3. `order_date`: missing → the row is dropped. This is the only place
//!    where rows leave the table.
//!
//! Counts of repaired values and dropped rows are returned, never thrown.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::coerce::{CalendarParts, TypedRow};
use super::stats::median;
use crate::schema::Field;

/// A row with every repairable value filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub order_number: Option<i64>,
    pub line_number: Option<i64>,
    pub order_date: NaiveDate,
    pub calendar: CalendarParts,
    pub quantity: i64,
    pub unit_price: f64,
    pub suggested_retail_price: Option<f64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
    pub product_line: String,
    pub product_code: String,
    pub customer_name: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub deal_size: String,
    pub passthrough: Vec<Option<String>>,
}

/// What the resolver did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationReport {
    /// Missing values per column before repair
    pub missing_values: BTreeMap<String, usize>,
    pub repaired_values: BTreeMap<String, usize>,
    pub medians: BTreeMap<String, f64>,
    pub dropped_rows: usize,
}

/// Fill a numeric column with the median of its present values.
fn fill_median<F>(rows: &mut [TypedRow], field: Field, report: &mut ImputationReport, slot: F)
where
    F: Fn(&mut TypedRow) -> &mut Option<f64>,
{
    let present: Vec<f64> = rows.iter_mut().filter_map(|r| *slot(r)).collect();
    let missing = rows.len() - present.len();
    if missing == 0 {
        return;
    }

    let fill = median(&present).unwrap_or(0.0);
    for row in rows.iter_mut() {
        slot(row).get_or_insert(fill);
    }

    report.medians.insert(field.name().to_string(), fill);
    report.repaired_values.insert(field.name().to_string(), missing);
}

/// Repair missing values and drop rows without an order date.
pub fn resolve_missing(mut rows: Vec<TypedRow>, unknown: &str) -> (Vec<CleanRow>, ImputationReport) {
    let mut report = ImputationReport::default();

    for field in Field::ALL {
        let missing = rows.iter().filter(|r| r.is_missing(field)).count();
        if missing > 0 {
            report.missing_values.insert(field.name().to_string(), missing);
        }
    }

    // 1. Numeric-critical columns
    fill_median(&mut rows, Field::Quantity, &mut report, |r| &mut r.quantity);
    fill_median(&mut rows, Field::UnitPrice, &mut report, |r| &mut r.unit_price);

    // 2. Categorical columns
    for field in Field::CATEGORICAL {
        let mut repaired = 0;
        for row in rows.iter_mut() {
            if let Some(slot) = row.text_mut(field) {
                if slot.is_none() {
                    *slot = Some(unknown.to_string());
                    repaired += 1;
                }
            }
        }
        if repaired > 0 {
            report.repaired_values.insert(field.name().to_string(), repaired);
        }
    }

    // 3. Date-critical column
    let before = rows.len();
    let clean: Vec<CleanRow> = rows.into_iter().filter_map(|row| into_clean(row, unknown)).collect();
    report.dropped_rows = before - clean.len();

    (clean, report)
}

fn into_clean(row: TypedRow, unknown: &str) -> Option<CleanRow> {
    let order_date = row.order_date?;
    let text = |v: Option<String>| v.unwrap_or_else(|| unknown.to_string());

    Some(CleanRow {
        order_number: row.order_number,
        line_number: row.line_number,
        order_date,
        calendar: row.calendar.unwrap_or_else(|| CalendarParts::from_date(order_date)),
        // Quantities are whole units; fractional medians truncate toward zero
        quantity: row.quantity.unwrap_or(0.0) as i64,
        unit_price: row.unit_price.unwrap_or(0.0),
        suggested_retail_price: row.suggested_retail_price,
        year: row.year,
        month: row.month,
        quarter: row.quarter,
        product_line: text(row.product_line),
        product_code: text(row.product_code),
        customer_name: text(row.customer_name),
        city: text(row.city),
        state: text(row.state),
        country: text(row.country),
        deal_size: text(row.deal_size),
        passthrough: row.passthrough,
    })
}
