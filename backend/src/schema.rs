//! Canonical schema of the sales export.
//!
//! Raw headers are normalized (lower-cased, spaces to underscores) and then
//! renamed through [`COLUMN_RENAMES`]. The resulting canonical names are
//! resolved once into a [`ColumnMap`], so that later stages address columns
//! through the typed [`Field`] enum instead of string lookups.
//!
//! ```text
//! "ORDERNUMBER" ─▶ "ordernumber" ─▶ "order_number" ─▶ Field::OrderNumber (Integer)
//! "Deal Size"   ─▶ "deal_size"   ─▶ "deal_size"    ─▶ Field::DealSize    (Text)
//! "PHONE"       ─▶ "phone"       ─▶ "phone"        ─▶ pass-through
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::SALES_COLUMNS;

/// Known source names and their canonical replacement.
///
/// Canonical names never appear as keys, which makes the rename idempotent.
pub const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("ordernumber", "order_number"),
    ("quantityordered", "quantity"),
    ("priceeach", "unit_price"),
    ("orderlinenumber", "line_number"),
    ("orderdate", "order_date"),
    ("qtr_id", "quarter"),
    ("month_id", "month"),
    ("year_id", "year"),
    ("productline", "product_line"),
    ("msrp", "suggested_retail_price"),
    ("productcode", "product_code"),
    ("customername", "customer_name"),
    ("addressline1", "address_line1"),
    ("addressline2", "address_line2"),
    ("postalcode", "postal_code"),
    ("contactlastname", "contact_last_name"),
    ("contactfirstname", "contact_first_name"),
    ("dealsize", "deal_size"),
];

/// Tokens read as a missing value.
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Is the raw cell a missing-value marker?
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_TOKENS.contains(&trimmed)
}

/// Value class of a canonical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Nullable whole number (identifiers, calendar ids)
    Integer,
    /// Numeric column that gets repaired when missing
    Numeric,
    /// Numeric column that stays missing when missing
    NullableNumeric,
    /// Free text / categorical
    Text,
    /// Calendar date
    Date,
}

/// Canonical columns addressed by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    OrderNumber,
    Quantity,
    UnitPrice,
    LineNumber,
    OrderDate,
    Quarter,
    Month,
    Year,
    ProductLine,
    SuggestedRetailPrice,
    ProductCode,
    CustomerName,
    City,
    State,
    Country,
    DealSize,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::OrderNumber,
        Field::Quantity,
        Field::UnitPrice,
        Field::LineNumber,
        Field::OrderDate,
        Field::Quarter,
        Field::Month,
        Field::Year,
        Field::ProductLine,
        Field::SuggestedRetailPrice,
        Field::ProductCode,
        Field::CustomerName,
        Field::City,
        Field::State,
        Field::Country,
        Field::DealSize,
    ];

    /// Categorical columns repaired with the unknown sentinel, in repair order.
    pub const CATEGORICAL: [Field; 7] = [
        Field::ProductLine,
        Field::ProductCode,
        Field::CustomerName,
        Field::City,
        Field::State,
        Field::Country,
        Field::DealSize,
    ];

    /// Canonical column name.
    pub fn name(self) -> &'static str {
        match self {
            Field::OrderNumber => "order_number",
            Field::Quantity => "quantity",
            Field::UnitPrice => "unit_price",
            Field::LineNumber => "line_number",
            Field::OrderDate => "order_date",
            Field::Quarter => "quarter",
            Field::Month => "month",
            Field::Year => "year",
            Field::ProductLine => "product_line",
            Field::SuggestedRetailPrice => "suggested_retail_price",
            Field::ProductCode => "product_code",
            Field::CustomerName => "customer_name",
            Field::City => "city",
            Field::State => "state",
            Field::Country => "country",
            Field::DealSize => "deal_size",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::OrderNumber | Field::LineNumber | Field::Quarter | Field::Month | Field::Year => {
                FieldKind::Integer
            }
            Field::Quantity | Field::UnitPrice => FieldKind::Numeric,
            Field::SuggestedRetailPrice => FieldKind::NullableNumeric,
            Field::OrderDate => FieldKind::Date,
            Field::ProductLine
            | Field::ProductCode
            | Field::CustomerName
            | Field::City
            | Field::State
            | Field::Country
            | Field::DealSize => FieldKind::Text,
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }
}

/// Lower-case a raw header and replace spaces with underscores.
pub fn standardize_column_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// Normalize a raw header to its canonical name.
///
/// Names not present in [`COLUMN_RENAMES`] pass through standardized but
/// otherwise unchanged.
pub fn normalize_column_name(raw: &str) -> String {
    let standardized = standardize_column_name(raw);
    COLUMN_RENAMES
        .iter()
        .find(|(from, _)| *from == standardized)
        .map(|(_, to)| to.to_string())
        .unwrap_or(standardized)
}

/// Normalize every header of a table.
pub fn normalize_headers(headers: &[String]) -> Vec<String> {
    headers.iter().map(|h| normalize_column_name(h)).collect()
}

/// Positions of canonical fields and pass-through columns within a row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    fields: HashMap<Field, usize>,
    passthrough: Vec<(String, usize)>,
    shadowed: Vec<String>,
}

impl ColumnMap {
    /// Resolve normalized headers against the canonical schema.
    ///
    /// When a canonical name appears more than once the first occurrence
    /// wins. Columns that would repeat a `sales_data` column name (computed
    /// ones such as `line_total` included) or an earlier pass-through name
    /// are ignored and listed in [`ColumnMap::shadowed`].
    pub fn resolve(normalized: &[String]) -> Self {
        let mut map = ColumnMap::default();
        let mut passthrough_names = HashSet::new();
        for (idx, name) in normalized.iter().enumerate() {
            match Field::from_name(name) {
                Some(field) if !map.fields.contains_key(&field) => {
                    map.fields.insert(field, idx);
                }
                _ if SALES_COLUMNS.contains(&name.as_str()) || !passthrough_names.insert(name.as_str()) => {
                    map.shadowed.push(name.clone());
                }
                _ => map.passthrough.push((name.clone(), idx)),
            }
        }
        map
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Canonical fields missing from the input.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL.iter().copied().filter(|f| !self.contains(*f)).collect()
    }

    /// Columns outside the canonical schema, in input order.
    pub fn passthrough(&self) -> &[(String, usize)] {
        &self.passthrough
    }

    /// Input columns ignored because their name is already taken.
    pub fn shadowed(&self) -> &[String] {
        &self.shadowed
    }

    /// Read a field's raw cell from a row.
    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> Option<&'a str> {
        self.position(field)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_are_renamed() {
        assert_eq!(normalize_column_name("ORDERNUMBER"), "order_number");
        assert_eq!(normalize_column_name("PRICEEACH"), "unit_price");
        assert_eq!(normalize_column_name("QTR_ID"), "quarter");
        assert_eq!(normalize_column_name("MSRP"), "suggested_retail_price");
    }

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(normalize_column_name("Deal Size"), "deal_size");
        assert_eq!(normalize_column_name("Order Date"), "order_date");
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(normalize_column_name("PHONE"), "phone");
        assert_eq!(normalize_column_name("Territory"), "territory");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw: Vec<String> = ["ORDERNUMBER", "QUANTITYORDERED", "Deal Size", "PHONE"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let once = normalize_headers(&raw);
        let twice = normalize_headers(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_canonical_names_are_not_rename_keys() {
        for (_, to) in COLUMN_RENAMES {
            assert!(COLUMN_RENAMES.iter().all(|(from, _)| from != to));
        }
    }

    #[test]
    fn test_column_map_resolution() {
        let headers = normalize_headers(&[
            "ORDERNUMBER".to_string(),
            "PHONE".to_string(),
            "ORDERDATE".to_string(),
        ]);
        let map = ColumnMap::resolve(&headers);

        assert_eq!(map.position(Field::OrderNumber), Some(0));
        assert_eq!(map.position(Field::OrderDate), Some(2));
        assert_eq!(map.passthrough(), &[("phone".to_string(), 1)]);
        assert!(map.missing_fields().contains(&Field::Quantity));
    }

    #[test]
    fn test_output_column_names_are_not_passed_through() {
        let headers = normalize_headers(&[
            "ORDERNUMBER".to_string(),
            "LINE_TOTAL".to_string(),
            "Order Year".to_string(),
            "ORDERNUMBER".to_string(),
            "PHONE".to_string(),
            "phone".to_string(),
        ]);
        let map = ColumnMap::resolve(&headers);

        assert_eq!(map.position(Field::OrderNumber), Some(0));
        assert_eq!(map.passthrough(), &[("phone".to_string(), 4)]);
        assert_eq!(map.shadowed(), &["line_total", "order_year", "order_number", "phone"]);
    }

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing(""));
        assert!(is_missing("  "));
        assert!(is_missing("NaN"));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
        assert!(!is_missing("Unknown"));
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(Field::Quantity.kind(), FieldKind::Numeric);
        assert_eq!(Field::SuggestedRetailPrice.kind(), FieldKind::NullableNumeric);
        assert_eq!(Field::OrderDate.kind(), FieldKind::Date);
        assert_eq!(Field::DealSize.kind(), FieldKind::Text);
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
    }
}
