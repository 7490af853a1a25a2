//! Aggregation by calendar month.
//!
//! Keys come from the export's own `year`/`month` columns. A row missing
//! either of them falls back to the calendar parts of its order date, so
//! every row lands in exactly one month.

use super::frame::{distinct_keys, group_reduce, Dimension, KeyedFrame, Measure, Reducer};
use crate::models::{SalesRecord, TimeAggregate};

pub const TOTAL_SALES: &str = "total_sales";
pub const ORDER_COUNT: &str = "order_count";
pub const CUSTOMER_COUNT: &str = "customer_count";
pub const TOTAL_QUANTITY: &str = "total_quantity";

const REDUCERS: [(&str, Reducer); 4] = [
    (TOTAL_SALES, Reducer::Sum(Measure::LineTotal)),
    (ORDER_COUNT, Reducer::CountDistinct(Dimension::OrderNumber)),
    (CUSTOMER_COUNT, Reducer::CountDistinct(Dimension::CustomerName)),
    (TOTAL_QUANTITY, Reducer::Sum(Measure::Quantity)),
];

/// `(year, month)` group key of a row.
pub fn month_key(row: &SalesRecord) -> (i32, u32) {
    match (row.year, row.month) {
        (Some(year), Some(month)) => (year, month),
        _ => (row.order_year, row.order_month),
    }
}

/// Number of rows keyed by their order date instead of the export's columns.
pub fn fallback_rows(rows: &[SalesRecord]) -> usize {
    rows.iter().filter(|r| r.year.is_none() || r.month.is_none()).count()
}

/// Build the time frame: base keys, then one left-join per reducer.
pub fn time_frame(rows: &[SalesRecord]) -> KeyedFrame<(i32, u32)> {
    let mut frame = KeyedFrame::from_keys(distinct_keys(rows, month_key));
    for (name, reducer) in REDUCERS {
        frame.left_join(name, group_reduce(rows, month_key, reducer));
    }
    frame
}

/// Aggregate sales per calendar month.
pub fn aggregate_time(rows: &[SalesRecord]) -> (Vec<TimeAggregate>, Vec<String>) {
    let frame = time_frame(rows);

    let months = frame
        .rows()
        .map(|(&(year, month), row)| TimeAggregate {
            year,
            month,
            total_sales: row.float_or_zero(TOTAL_SALES),
            order_count: row.count_or_zero(ORDER_COUNT),
            customer_count: row.count_or_zero(CUSTOMER_COUNT),
            total_quantity: row.int_or_zero(TOTAL_QUANTITY),
        })
        .collect();

    let mut columns = vec!["year".to_string(), "month".to_string()];
    columns.extend(frame.column_names());
    (months, columns)
}
