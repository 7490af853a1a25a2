//! Aggregation by customer.

use super::frame::{Dimension, KeyedFrame, Measure, Reducer};
use crate::models::{CustomerAggregate, SalesRecord};

pub const TOTAL_ORDERS: &str = "total_orders";
pub const TOTAL_SALES: &str = "total_sales";
pub const TOTAL_QUANTITY: &str = "total_quantity";
pub const FIRST_ORDER: &str = "first_order";
pub const LAST_ORDER: &str = "last_order";

const REDUCERS: [(&str, Reducer); 5] = [
    (TOTAL_ORDERS, Reducer::CountDistinct(Dimension::OrderNumber)),
    (TOTAL_SALES, Reducer::Sum(Measure::LineTotal)),
    (TOTAL_QUANTITY, Reducer::Sum(Measure::Quantity)),
    (FIRST_ORDER, Reducer::MinOrderDate),
    (LAST_ORDER, Reducer::MaxOrderDate),
];

/// Build the customer frame: one single-pass group-by over `customer_name`.
pub fn customer_frame(rows: &[SalesRecord]) -> KeyedFrame<String> {
    KeyedFrame::aggregate(rows, |r| r.customer_name.clone(), &REDUCERS)
}

/// Aggregate sales per customer.
pub fn aggregate_customers(rows: &[SalesRecord]) -> (Vec<CustomerAggregate>, Vec<String>) {
    let frame = customer_frame(rows);

    let customers = frame
        .rows()
        // Every group holds at least one row, so both dates are present
        .filter_map(|(name, row)| {
            let first_order = row.date(FIRST_ORDER)?;
            let last_order = row.date(LAST_ORDER)?;
            Some(CustomerAggregate {
                customer_name: name.clone(),
                total_orders: row.count_or_zero(TOTAL_ORDERS),
                total_sales: row.float_or_zero(TOTAL_SALES),
                total_quantity: row.int_or_zero(TOTAL_QUANTITY),
                first_order,
                last_order,
                customer_lifetime_days: (last_order - first_order).num_days(),
            })
        })
        .collect();

    let mut columns = vec!["customer_name".to_string()];
    columns.extend(frame.column_names());
    columns.push("customer_lifetime_days".to_string());
    (customers, columns)
}
