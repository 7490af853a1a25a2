//! Data-quality checks over the four output tables.
//!
//! Nothing here fails the transform: every finding is returned as a
//! warning string for the [`TransformReport`](crate::models::TransformReport).
//!
//! # Checks
//!
//! - Column names ending in `_m<digits>`, the artifact left behind by a
//!   naive repeated merge
//! - Group keys unique within each aggregate
//! - `line_total` conserved into customer, product and month totals
//! - Product key set equal to the distinct product codes of the sales table

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;

use crate::models::{CustomerAggregate, ProductAggregate, SalesRecord, TimeAggregate};

static MERGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_m\d+$").expect("merge suffix pattern is valid"));

/// Relative tolerance for float conservation checks.
const SUM_TOLERANCE: f64 = 1e-9;

/// Does the column name carry a merge suffix such as `total_sales_m1`?
pub fn has_merge_suffix(column: &str) -> bool {
    MERGE_SUFFIX.is_match(column)
}

/// Scan `(table, columns)` pairs for merge-suffix artifacts.
pub fn scan_merge_artifacts<'a, I>(tables: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    tables
        .into_iter()
        .flat_map(|(table, columns)| {
            columns
                .iter()
                .filter(|c| has_merge_suffix(c))
                .map(move |c| format!("{}.{}", table, c))
        })
        .collect()
}

fn duplicate_keys<K, I>(keys: I) -> usize
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| !seen.insert(k.clone())).count()
}

fn sums_match(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= SUM_TOLERANCE * expected.abs().max(1.0)
}

/// Check that the aggregates are consistent with the sales table.
pub fn check_consistency(
    sales: &[SalesRecord],
    customers: &[CustomerAggregate],
    products: &[ProductAggregate],
    time: &[TimeAggregate],
) -> Vec<String> {
    let mut warnings = Vec::new();

    let dup = duplicate_keys(customers.iter().map(|c| c.customer_name.as_str()));
    if dup > 0 {
        warnings.push(format!("customer_aggregations has {} duplicate customer_name keys", dup));
    }
    let dup = duplicate_keys(products.iter().map(|p| p.product_code.as_str()));
    if dup > 0 {
        warnings.push(format!("product_aggregations has {} duplicate product_code keys", dup));
    }
    let dup = duplicate_keys(time.iter().map(|t| (t.year, t.month)));
    if dup > 0 {
        warnings.push(format!("time_aggregations has {} duplicate (year, month) keys", dup));
    }

    let total: f64 = sales.iter().map(|r| r.line_total).sum();
    let totals = [
        ("customer_aggregations.total_sales", customers.iter().map(|c| c.total_sales).sum::<f64>()),
        ("product_aggregations.total_revenue", products.iter().map(|p| p.total_revenue).sum::<f64>()),
        ("time_aggregations.total_sales", time.iter().map(|t| t.total_sales).sum::<f64>()),
    ];
    for (column, sum) in totals {
        if !sums_match(total, sum) {
            warnings.push(format!(
                "{} sums to {:.4} but sales_data.line_total sums to {:.4}",
                column, sum, total
            ));
        }
    }

    let sold: HashSet<&str> = sales.iter().map(|r| r.product_code.as_str()).collect();
    let aggregated: HashSet<&str> = products.iter().map(|p| p.product_code.as_str()).collect();
    let missing = sold.difference(&aggregated).count();
    if missing > 0 {
        warnings.push(format!("{} product codes missing from product_aggregations", missing));
    }
    let extra = aggregated.difference(&sold).count();
    if extra > 0 {
        warnings.push(format!("{} product codes in product_aggregations have no sales", extra));
    }

    warnings
}
