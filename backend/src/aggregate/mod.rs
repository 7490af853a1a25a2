//! Aggregation engine.
//!
//! Three independent group-by pipelines over the same cleaned table:
//!
//! - [`customer`] - by `customer_name` (single-pass, mixed reducers)
//! - [`product`] - by `product_code` (key base + left-joined reducers)
//! - [`time`] - by `(year, month)` (key base + left-joined reducers)
//!
//! Output row order is first appearance in the sales table; consumers must
//! not rely on it. Group keys are unique within each table.

pub mod customer;
pub mod frame;
pub mod product;
pub mod time;

pub use customer::aggregate_customers;
pub use frame::{KeyedFrame, Reducer};
pub use product::aggregate_products;
pub use time::aggregate_time;

use crate::models::{CustomerAggregate, ProductAggregate, SalesRecord, TimeAggregate};

/// The three aggregate tables with their column names.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub customers: Vec<CustomerAggregate>,
    pub products: Vec<ProductAggregate>,
    pub time: Vec<TimeAggregate>,
    /// (table, column names) for the validation pass
    pub columns: Vec<(&'static str, Vec<String>)>,
    /// Rows whose month key came from the order date
    pub time_fallback_rows: usize,
}

/// Run all three pipelines.
pub fn build_aggregates(rows: &[SalesRecord]) -> Aggregates {
    let (customers, customer_columns) = aggregate_customers(rows);
    let (products, product_columns) = aggregate_products(rows);
    let (time, time_columns) = aggregate_time(rows);

    Aggregates {
        customers,
        products,
        time,
        columns: vec![
            ("customer_aggregations", customer_columns),
            ("product_aggregations", product_columns),
            ("time_aggregations", time_columns),
        ],
        time_fallback_rows: time::fallback_rows(rows),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sale;
    use super::*;

    #[test]
    fn test_sales_are_conserved_across_aggregates() {
        let rows = vec![
            sale(1, "Acme", "P1", 2, 10.5, (2003, 1, 6)),
            sale(1, "Acme", "P2", 3, 7.25, (2003, 1, 6)),
            sale(2, "Zeta", "P1", 4, 3.0, (2003, 2, 9)),
            sale(3, "Unknown", "Unknown", 1, 99.0, (2004, 6, 30)),
        ];
        let total: f64 = rows.iter().map(|r| r.line_total).sum();
        let aggregates = build_aggregates(&rows);

        let by_customer: f64 = aggregates.customers.iter().map(|c| c.total_sales).sum();
        let by_product: f64 = aggregates.products.iter().map(|p| p.total_revenue).sum();
        let by_month: f64 = aggregates.time.iter().map(|t| t.total_sales).sum();
        assert!((by_customer - total).abs() < 1e-9);
        assert!((by_product - total).abs() < 1e-9);
        assert!((by_month - total).abs() < 1e-9);
        assert_eq!(aggregates.time_fallback_rows, 4);
        assert_eq!(aggregates.columns.len(), 3);
    }
}
