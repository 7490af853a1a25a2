//! Aggregation by product code.
//!
//! The base key set is every distinct `product_code` of the cleaned table;
//! each reducer runs as its own group-by and is left-joined onto the base.

use super::frame::{distinct_keys, group_reduce, Dimension, KeyedFrame, Measure, Reducer};
use crate::models::{ProductAggregate, SalesRecord};

pub const TOTAL_QUANTITY: &str = "total_quantity";
pub const TOTAL_REVENUE: &str = "total_revenue";
pub const ORDER_COUNT: &str = "order_count";
pub const CUSTOMER_COUNT: &str = "customer_count";

const REDUCERS: [(&str, Reducer); 4] = [
    (TOTAL_QUANTITY, Reducer::Sum(Measure::Quantity)),
    (TOTAL_REVENUE, Reducer::Sum(Measure::LineTotal)),
    (ORDER_COUNT, Reducer::CountDistinct(Dimension::OrderNumber)),
    (CUSTOMER_COUNT, Reducer::CountDistinct(Dimension::CustomerName)),
];

fn product_key(row: &SalesRecord) -> String {
    row.product_code.clone()
}

/// Build the product frame: base keys, then one left-join per reducer.
pub fn product_frame(rows: &[SalesRecord]) -> KeyedFrame<String> {
    let mut frame = KeyedFrame::from_keys(distinct_keys(rows, product_key));
    for (name, reducer) in REDUCERS {
        frame.left_join(name, group_reduce(rows, product_key, reducer));
    }
    frame
}

/// Aggregate sales per product.
pub fn aggregate_products(rows: &[SalesRecord]) -> (Vec<ProductAggregate>, Vec<String>) {
    let frame = product_frame(rows);

    let products = frame
        .rows()
        .map(|(code, row)| ProductAggregate {
            product_code: code.clone(),
            total_quantity: row.int_or_zero(TOTAL_QUANTITY),
            total_revenue: row.float_or_zero(TOTAL_REVENUE),
            order_count: row.count_or_zero(ORDER_COUNT),
            customer_count: row.count_or_zero(CUSTOMER_COUNT),
        })
        .collect();

    let mut columns = vec!["product_code".to_string()];
    columns.extend(frame.column_names());
    (products, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::sale;
    use std::collections::HashSet;

    #[test]
    fn test_every_reducer_contributes() {
        let rows = vec![
            sale(1, "Acme", "S10_1678", 30, 95.0, (2003, 2, 24)),
            sale(2, "Acme", "S10_1678", 20, 100.0, (2003, 5, 7)),
            sale(2, "Zeta", "S10_1678", 10, 100.0, (2003, 5, 7)),
            sale(3, "Zeta", "S18_2248", 5, 50.0, (2003, 7, 1)),
        ];
        let (products, columns) = aggregate_products(&rows);

        assert_eq!(columns, vec!["product_code", "total_quantity", "total_revenue", "order_count", "customer_count"]);
        let p = products.iter().find(|p| p.product_code == "S10_1678").unwrap();
        assert_eq!(p.total_quantity, 60);
        assert_eq!(p.total_revenue, 30.0 * 95.0 + 20.0 * 100.0 + 10.0 * 100.0);
        assert_eq!(p.order_count, 2);
        assert_eq!(p.customer_count, 2);
    }

    #[test]
    fn test_product_set_matches_sales() {
        let rows = vec![
            sale(1, "Acme", "X99", 1, 1.0, (2003, 1, 1)),
            sale(2, "Acme", "Unknown", 1, 1.0, (2003, 1, 1)),
            sale(3, "Acme", "X99", 1, 1.0, (2003, 1, 1)),
        ];
        let (products, _) = aggregate_products(&rows);

        let expected: HashSet<_> = rows.iter().map(|r| r.product_code.clone()).collect();
        let actual: HashSet<_> = products.iter().map(|p| p.product_code.clone()).collect();
        assert_eq!(actual, expected);
        assert_eq!(products.len(), expected.len());
    }

    #[test]
    fn test_empty_input() {
        let (products, _) = aggregate_products(&[]);
        assert!(products.is_empty());
    }
}
