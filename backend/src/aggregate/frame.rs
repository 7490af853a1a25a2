//! Keyed frames and group-by reducers.
//!
//! A [`KeyedFrame`] holds a fixed set of group keys (the base) and named
//! columns aligned with it. Reducer results are merged onto the base with
//! [`KeyedFrame::left_join`], so a key never disappears because one
//! reducer produced nothing for it.
//!
//! ```text
//! base keys      sum(quantity)     count_distinct(order_number)
//! ┌───────┐      ┌───────┬────┐    ┌───────┬───┐
//! │ S10_1 │  ◀── │ S10_1 │ 70 │ ◀─ │ S10_1 │ 2 │
//! │ S12_4 │      │ S12_4 │ 12 │    └───────┴───┘
//! └───────┘      └───────┴────┘
//! result: S10_1 → (70, 2), S12_4 → (12, None)
//! ```

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::models::SalesRecord;

/// Summable per-row measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Quantity,
    LineTotal,
}

/// Attribute whose distinct values are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    OrderNumber,
    CustomerName,
}

/// How a group of rows is reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum(Measure),
    CountDistinct(Dimension),
    MinOrderDate,
    MaxOrderDate,
}

/// A reduced value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Count(u64),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Distinct<'a> {
    Int(i64),
    Text(&'a str),
}

enum Accumulator<'a> {
    SumInt(i64),
    SumFloat(f64),
    Distinct(Dimension, HashSet<Distinct<'a>>),
    Min(Option<NaiveDate>),
    Max(Option<NaiveDate>),
}

impl<'a> Accumulator<'a> {
    fn new(reducer: Reducer) -> Self {
        match reducer {
            Reducer::Sum(Measure::Quantity) => Accumulator::SumInt(0),
            Reducer::Sum(Measure::LineTotal) => Accumulator::SumFloat(0.0),
            Reducer::CountDistinct(dim) => Accumulator::Distinct(dim, HashSet::new()),
            Reducer::MinOrderDate => Accumulator::Min(None),
            Reducer::MaxOrderDate => Accumulator::Max(None),
        }
    }

    fn push(&mut self, row: &'a SalesRecord) {
        match self {
            Accumulator::SumInt(total) => *total = total.saturating_add(row.quantity),
            Accumulator::SumFloat(total) => *total += row.line_total,
            Accumulator::Distinct(Dimension::OrderNumber, seen) => {
                // Missing order numbers are not a distinct value
                if let Some(n) = row.order_number {
                    seen.insert(Distinct::Int(n));
                }
            }
            Accumulator::Distinct(Dimension::CustomerName, seen) => {
                seen.insert(Distinct::Text(&row.customer_name));
            }
            Accumulator::Min(current) => {
                *current = Some(current.map_or(row.order_date, |d| d.min(row.order_date)));
            }
            Accumulator::Max(current) => {
                *current = Some(current.map_or(row.order_date, |d| d.max(row.order_date)));
            }
        }
    }

    fn finish(self) -> Option<Value> {
        match self {
            Accumulator::SumInt(total) => Some(Value::Int(total)),
            Accumulator::SumFloat(total) => Some(Value::Float(total)),
            Accumulator::Distinct(_, seen) => Some(Value::Count(seen.len() as u64)),
            Accumulator::Min(date) | Accumulator::Max(date) => date.map(Value::Date),
        }
    }
}

/// Distinct keys of `rows`, in order of first appearance.
pub fn distinct_keys<K, F>(rows: &[SalesRecord], key: F) -> Vec<K>
where
    K: Hash + Eq + Clone,
    F: Fn(&SalesRecord) -> K,
{
    let mut seen = HashSet::new();
    rows.iter()
        .map(key)
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Group `rows` by `key` and reduce each group with `reducer`.
pub fn group_reduce<K, F>(rows: &[SalesRecord], key: F, reducer: Reducer) -> HashMap<K, Value>
where
    K: Hash + Eq,
    F: Fn(&SalesRecord) -> K,
{
    let mut groups: HashMap<K, Accumulator<'_>> = HashMap::new();
    for row in rows {
        groups
            .entry(key(row))
            .or_insert_with(|| Accumulator::new(reducer))
            .push(row);
    }

    groups
        .into_iter()
        .filter_map(|(k, acc)| acc.finish().map(|v| (k, v)))
        .collect()
}

/// A named column aligned with a frame's keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<Value>>,
}

/// Fixed key base with left-joined reducer columns.
#[derive(Debug, Clone)]
pub struct KeyedFrame<K> {
    keys: Vec<K>,
    columns: Vec<Column>,
}

impl<K> KeyedFrame<K>
where
    K: Hash + Eq + Clone,
{
    /// Start a frame from a base key set. Duplicate keys are collapsed.
    pub fn from_keys(keys: impl IntoIterator<Item = K>) -> Self {
        let mut seen = HashSet::new();
        let keys = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
        Self { keys, columns: Vec::new() }
    }

    /// Single-pass group-by: one column per `(name, reducer)` over the keys
    /// present in `rows`.
    pub fn aggregate<F>(rows: &[SalesRecord], key: F, reducers: &[(&str, Reducer)]) -> Self
    where
        F: Fn(&SalesRecord) -> K,
    {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut keys = Vec::new();
        let mut accumulators: Vec<Vec<Accumulator<'_>>> = Vec::new();

        for row in rows {
            let k = key(row);
            let slot = *index.entry(k.clone()).or_insert_with(|| {
                keys.push(k);
                accumulators.push(reducers.iter().map(|(_, r)| Accumulator::new(*r)).collect());
                keys.len() - 1
            });
            for acc in accumulators[slot].iter_mut() {
                acc.push(row);
            }
        }

        let mut columns: Vec<Column> = reducers
            .iter()
            .map(|(name, _)| Column { name: name.to_string(), values: Vec::with_capacity(keys.len()) })
            .collect();
        for group in accumulators {
            for (column, acc) in columns.iter_mut().zip(group) {
                column.values.push(acc.finish());
            }
        }

        Self { keys, columns }
    }

    /// Merge a reducer result onto the base. Keys absent from `reduced` get
    /// `None`; keys absent from the base are ignored.
    ///
    /// The customer, product and time builders never repeat a column name,
    /// so on their path the name is kept as given. Any other caller that
    /// joins a name twice gets `_m<n>` appended instead of overwriting the
    /// first column, and the validation pass reports the suffixed name.
    pub fn left_join(&mut self, name: &str, mut reduced: HashMap<K, Value>) {
        let values = self.keys.iter().map(|k| reduced.remove(k)).collect();
        let name = self.unique_name(name);
        self.columns.push(Column { name, values });
    }

    fn unique_name(&self, name: &str) -> String {
        let taken = |candidate: &str| self.columns.iter().any(|c| c.name == candidate);
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{}_m{}", name, n))
            .find(|candidate| !taken(candidate.as_str()))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Iterate over rows as (key, row view).
    pub fn rows(&self) -> impl Iterator<Item = (&K, FrameRow<'_, K>)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(move |(idx, key)| (key, FrameRow { frame: self, idx }))
    }
}

/// One row of a [`KeyedFrame`].
///
/// Missing numeric values read as zero: a key with no contributing rows has
/// summed nothing and counted nothing.
pub struct FrameRow<'f, K> {
    frame: &'f KeyedFrame<K>,
    idx: usize,
}

impl<K> FrameRow<'_, K> {
    fn value(&self, name: &str) -> Option<Value> {
        self.frame
            .columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.values.get(self.idx).copied().flatten())
    }

    pub fn int_or_zero(&self, name: &str) -> i64 {
        match self.value(name) {
            Some(Value::Int(v)) => v,
            Some(Value::Count(v)) => v as i64,
            _ => 0,
        }
    }

    pub fn float_or_zero(&self, name: &str) -> f64 {
        match self.value(name) {
            Some(Value::Float(v)) => v,
            Some(Value::Int(v)) => v as f64,
            _ => 0.0,
        }
    }

    pub fn count_or_zero(&self, name: &str) -> u64 {
        match self.value(name) {
            Some(Value::Count(v)) => v,
            _ => 0,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.value(name) {
            Some(Value::Date(d)) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::sale;

    #[test]
    fn test_group_reduce_sum_and_distinct() {
        let rows = vec![
            sale(1, "Acme", "P1", 2, 10.0, (2003, 1, 6)),
            sale(1, "Acme", "P1", 3, 10.0, (2003, 1, 6)),
            sale(2, "Zeta", "P1", 5, 10.0, (2003, 2, 6)),
        ];

        let qty = group_reduce(&rows, |r| r.product_code.clone(), Reducer::Sum(Measure::Quantity));
        assert_eq!(qty.get("P1"), Some(&Value::Int(10)));

        let orders = group_reduce(
            &rows,
            |r| r.product_code.clone(),
            Reducer::CountDistinct(Dimension::OrderNumber),
        );
        assert_eq!(orders.get("P1"), Some(&Value::Count(2)));
    }

    #[test]
    fn test_quantity_sum_saturates() {
        let rows = vec![
            sale(1, "Acme", "P1", i64::MAX - 1, 1.0, (2003, 1, 6)),
            sale(2, "Acme", "P1", 5, 1.0, (2003, 1, 6)),
        ];

        let qty = group_reduce(&rows, |_| (), Reducer::Sum(Measure::Quantity));
        assert_eq!(qty.get(&()), Some(&Value::Int(i64::MAX)));
    }

    #[test]
    fn test_missing_order_numbers_are_not_counted() {
        let mut unnumbered = sale(0, "Acme", "P1", 1, 1.0, (2003, 1, 6));
        unnumbered.order_number = None;
        let rows = vec![unnumbered, sale(7, "Acme", "P1", 1, 1.0, (2003, 1, 6))];

        let orders = group_reduce(&rows, |_| (), Reducer::CountDistinct(Dimension::OrderNumber));
        assert_eq!(orders.get(&()), Some(&Value::Count(1)));
    }

    #[test]
    fn test_left_join_keeps_keys_without_contribution() {
        let mut frame = KeyedFrame::from_keys(vec!["P1".to_string(), "P2".to_string()]);
        let partial: HashMap<String, Value> = [("P1".to_string(), Value::Int(4))].into();
        frame.left_join("total_quantity", partial);

        assert_eq!(frame.len(), 2);
        let rows: Vec<_> = frame.rows().map(|(k, row)| (k.clone(), row.int_or_zero("total_quantity"))).collect();
        assert_eq!(rows, vec![("P1".to_string(), 4), ("P2".to_string(), 0)]);
        assert_eq!(frame.column("total_quantity").unwrap().values[1], None);
    }

    #[test]
    fn test_repeated_join_name_gets_merge_suffix() {
        let mut frame = KeyedFrame::from_keys(vec![1]);
        frame.left_join("total", HashMap::new());
        frame.left_join("total", HashMap::new());
        frame.left_join("total", HashMap::new());

        assert_eq!(frame.column_names(), vec!["total", "total_m1", "total_m2"]);
    }

    #[test]
    fn test_aggregate_single_pass() {
        let rows = vec![
            sale(1, "Acme", "P1", 2, 10.0, (2003, 3, 1)),
            sale(2, "Acme", "P2", 1, 5.0, (2003, 1, 1)),
            sale(3, "Zeta", "P1", 1, 5.0, (2003, 2, 1)),
        ];
        let frame = KeyedFrame::aggregate(
            &rows,
            |r| r.customer_name.clone(),
            &[("first", Reducer::MinOrderDate), ("last", Reducer::MaxOrderDate)],
        );

        assert_eq!(frame.keys(), &["Acme".to_string(), "Zeta".to_string()]);
        let (_, acme) = frame.rows().next().unwrap();
        assert_eq!(acme.date("first"), NaiveDate::from_ymd_opt(2003, 1, 1));
        assert_eq!(acme.date("last"), NaiveDate::from_ymd_opt(2003, 3, 1));
    }

    #[test]
    fn test_distinct_keys_first_appearance_order() {
        let rows = vec![
            sale(1, "B", "P2", 1, 1.0, (2003, 1, 1)),
            sale(2, "A", "P1", 1, 1.0, (2003, 1, 1)),
            sale(3, "B", "P2", 1, 1.0, (2003, 1, 1)),
        ];
        assert_eq!(distinct_keys(&rows, |r| r.product_code.clone()), vec!["P2", "P1"]);
    }
}
