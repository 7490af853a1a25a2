//! Type coercion and date enrichment.
//!
//! Every cell is parsed into its [`FieldKind`](crate::schema::FieldKind).
//! Parsing never aborts: a cell either yields a value or a
//! [`CoerceFailure`], and failures become missing values for the
//! missing-value resolver. No row is dropped here.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::RawTable;
use crate::schema::{is_missing, ColumnMap, Field};

/// Why a cell did not yield a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CoerceFailure {
    /// Empty cell, NA token or absent column
    Missing,
    /// Cell present but not parseable as the column's type
    Invalid { raw: String },
}

pub type Coerced<T> = Result<T, CoerceFailure>;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

fn present(raw: Option<&str>) -> Coerced<&str> {
    match raw {
        Some(value) if !is_missing(value) => Ok(value.trim()),
        _ => Err(CoerceFailure::Missing),
    }
}

fn invalid(raw: &str) -> CoerceFailure {
    CoerceFailure::Invalid { raw: raw.to_string() }
}

/// Parse a date permissively. Any time-of-day component is discarded.
pub fn parse_date(raw: Option<&str>) -> Coerced<NaiveDate> {
    let value = present(raw)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(d);
        }
    }

    Err(invalid(value))
}

/// Parse a finite number.
pub fn parse_number(raw: Option<&str>) -> Coerced<f64> {
    let value = present(raw)?;
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(invalid(value)),
    }
}

/// Parse a whole number; integral floats such as `"10107.0"` are accepted.
pub fn parse_integer(raw: Option<&str>) -> Coerced<i64> {
    let value = present(raw)?;
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Ok(n as i64),
        _ => Err(invalid(value)),
    }
}

/// Largest quantity accepted on one order line.
pub const MAX_QUANTITY: f64 = 1_000_000_000.0;

/// Parse a quantity: numeric, non-negative and at most [`MAX_QUANTITY`].
pub fn parse_quantity(raw: Option<&str>) -> Coerced<f64> {
    match parse_number(raw)? {
        n if !(0.0..=MAX_QUANTITY).contains(&n) => Err(invalid(raw.unwrap_or_default().trim())),
        n => Ok(n),
    }
}

/// Read a categorical value.
pub fn parse_text(raw: Option<&str>) -> Coerced<String> {
    present(raw).map(str::to_string)
}

fn narrow<T: TryFrom<i64>>(value: Coerced<i64>, raw: Option<&str>) -> Coerced<T> {
    value.and_then(|n| T::try_from(n).map_err(|_| invalid(raw.unwrap_or_default().trim())))
}

/// Calendar parts derived from the order date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub quarter: u32,
    /// Monday = 0
    pub day_of_week: u32,
}

impl CalendarParts {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            quarter: (date.month() - 1) / 3 + 1,
            day_of_week: date.weekday().num_days_from_monday(),
        }
    }
}

/// A row after coercion: typed, but possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRow {
    pub order_number: Option<i64>,
    pub line_number: Option<i64>,
    pub order_date: Option<NaiveDate>,
    pub calendar: Option<CalendarParts>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub suggested_retail_price: Option<f64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub quarter: Option<u32>,
    pub product_line: Option<String>,
    pub product_code: Option<String>,
    pub customer_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub deal_size: Option<String>,
    pub passthrough: Vec<Option<String>>,
}

impl TypedRow {
    /// Mutable access to a categorical field.
    pub fn text_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::ProductLine => Some(&mut self.product_line),
            Field::ProductCode => Some(&mut self.product_code),
            Field::CustomerName => Some(&mut self.customer_name),
            Field::City => Some(&mut self.city),
            Field::State => Some(&mut self.state),
            Field::Country => Some(&mut self.country),
            Field::DealSize => Some(&mut self.deal_size),
            _ => None,
        }
    }

    /// Is the field's value missing?
    pub fn is_missing(&self, field: Field) -> bool {
        match field {
            Field::OrderNumber => self.order_number.is_none(),
            Field::LineNumber => self.line_number.is_none(),
            Field::OrderDate => self.order_date.is_none(),
            Field::Quantity => self.quantity.is_none(),
            Field::UnitPrice => self.unit_price.is_none(),
            Field::SuggestedRetailPrice => self.suggested_retail_price.is_none(),
            Field::Year => self.year.is_none(),
            Field::Month => self.month.is_none(),
            Field::Quarter => self.quarter.is_none(),
            Field::ProductLine => self.product_line.is_none(),
            Field::ProductCode => self.product_code.is_none(),
            Field::CustomerName => self.customer_name.is_none(),
            Field::City => self.city.is_none(),
            Field::State => self.state.is_none(),
            Field::Country => self.country.is_none(),
            Field::DealSize => self.deal_size.is_none(),
        }
    }
}

/// Outcome of coercing a whole table.
#[derive(Debug, Clone, Default)]
pub struct CoercedTable {
    pub rows: Vec<TypedRow>,
    /// Names of the pass-through columns, aligned with `TypedRow::passthrough`
    pub passthrough_columns: Vec<String>,
    /// Present-but-unparseable cells per column
    pub failures: BTreeMap<String, usize>,
}

/// Tallies failures while a row is being coerced.
struct FailureTally<'a> {
    failures: &'a mut BTreeMap<String, usize>,
}

impl FailureTally<'_> {
    fn take<T>(&mut self, field: Field, value: Coerced<T>) -> Option<T> {
        match value {
            Ok(v) => Some(v),
            Err(CoerceFailure::Missing) => None,
            Err(CoerceFailure::Invalid { .. }) => {
                *self.failures.entry(field.name().to_string()).or_insert(0) += 1;
                None
            }
        }
    }
}

/// Coerce every row of a raw table against the resolved column map.
pub fn coerce_table(table: &RawTable, columns: &ColumnMap) -> CoercedTable {
    let mut failures = BTreeMap::new();
    let mut rows = Vec::with_capacity(table.rows.len());

    for raw in &table.rows {
        let cell = |field: Field| columns.cell(raw, field);
        let mut tally = FailureTally { failures: &mut failures };

        let order_date = tally.take(Field::OrderDate, parse_date(cell(Field::OrderDate)));
        let row = TypedRow {
            order_number: tally.take(Field::OrderNumber, parse_integer(cell(Field::OrderNumber))),
            line_number: tally.take(Field::LineNumber, parse_integer(cell(Field::LineNumber))),
            order_date,
            calendar: order_date.map(CalendarParts::from_date),
            quantity: tally.take(Field::Quantity, parse_quantity(cell(Field::Quantity))),
            unit_price: tally.take(Field::UnitPrice, parse_number(cell(Field::UnitPrice))),
            suggested_retail_price: tally.take(
                Field::SuggestedRetailPrice,
                parse_number(cell(Field::SuggestedRetailPrice)),
            ),
            year: tally.take(Field::Year, narrow(parse_integer(cell(Field::Year)), cell(Field::Year))),
            month: tally.take(Field::Month, narrow(parse_integer(cell(Field::Month)), cell(Field::Month))),
            quarter: tally.take(
                Field::Quarter,
                narrow(parse_integer(cell(Field::Quarter)), cell(Field::Quarter)),
            ),
            product_line: parse_text(cell(Field::ProductLine)).ok(),
            product_code: parse_text(cell(Field::ProductCode)).ok(),
            customer_name: parse_text(cell(Field::CustomerName)).ok(),
            city: parse_text(cell(Field::City)).ok(),
            state: parse_text(cell(Field::State)).ok(),
            country: parse_text(cell(Field::Country)).ok(),
            deal_size: parse_text(cell(Field::DealSize)).ok(),
            passthrough: columns
                .passthrough()
                .iter()
                .map(|(_, idx)| raw.get(*idx).and_then(|v| parse_text(Some(v.as_str())).ok()))
                .collect(),
        };
        rows.push(row);
    }

    CoercedTable {
        rows,
        passthrough_columns: columns.passthrough().iter().map(|(name, _)| name.clone()).collect(),
        failures,
    }
}
