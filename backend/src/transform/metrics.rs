//! Per-row financial metrics, computed from cleaned and clamped values.

use super::impute::CleanRow;
use crate::models::SalesRecord;

/// `margin_percentage` is undefined when the suggested retail price is zero.
pub fn margin_percentage(margin: f64, suggested_retail_price: f64) -> Option<f64> {
    if suggested_retail_price == 0.0 {
        return None;
    }
    Some(100.0 * margin / suggested_retail_price)
}

/// Compute `line_total`, `margin` and `margin_percentage` for one row.
pub fn enrich(row: CleanRow) -> SalesRecord {
    let line_total = row.quantity as f64 * row.unit_price;
    let margin = row.suggested_retail_price.map(|srp| row.unit_price - srp);
    let margin_pct = match (margin, row.suggested_retail_price) {
        (Some(m), Some(srp)) => margin_percentage(m, srp),
        _ => None,
    };

    SalesRecord {
        order_number: row.order_number,
        line_number: row.line_number,
        order_date: row.order_date,
        quantity: row.quantity,
        unit_price: row.unit_price,
        suggested_retail_price: row.suggested_retail_price,
        product_line: row.product_line,
        product_code: row.product_code,
        customer_name: row.customer_name,
        city: row.city,
        state: row.state,
        country: row.country,
        deal_size: row.deal_size,
        year: row.year,
        month: row.month,
        quarter: row.quarter,
        order_year: row.calendar.year,
        order_month: row.calendar.month,
        order_day: row.calendar.day,
        order_quarter: row.calendar.quarter,
        order_day_of_week: row.calendar.day_of_week,
        line_total,
        margin,
        margin_percentage: margin_pct,
        passthrough: row.passthrough,
    }
}

/// Enrich every row; also returns how many rows had a zero suggested retail price.
pub fn derive_metrics(rows: Vec<CleanRow>) -> (Vec<SalesRecord>, usize) {
    let zero_msrp = rows
        .iter()
        .filter(|r| r.suggested_retail_price == Some(0.0))
        .count();
    (rows.into_iter().map(enrich).collect(), zero_msrp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::coerce::CalendarParts;
    use chrono::NaiveDate;

    fn line(quantity: i64, price: f64, msrp: Option<f64>) -> CleanRow {
        let date = NaiveDate::from_ymd_opt(2004, 7, 19).unwrap();
        CleanRow {
            order_number: Some(10250),
            line_number: Some(3),
            order_date: date,
            calendar: CalendarParts::from_date(date),
            quantity,
            unit_price: price,
            suggested_retail_price: msrp,
            year: Some(2004),
            month: Some(7),
            quarter: Some(3),
            product_line: "Classic Cars".into(),
            product_code: "X99".into(),
            customer_name: "Acme".into(),
            city: "NYC".into(),
            state: "NY".into(),
            country: "USA".into(),
            deal_size: "Small".into(),
            passthrough: vec![Some("555-0100".into())],
        }
    }

    #[test]
    fn test_metrics() {
        let record = enrich(line(4, 25.0, Some(20.0)));

        assert_eq!(record.line_total, 100.0);
        assert_eq!(record.margin, Some(5.0));
        assert_eq!(record.margin_percentage, Some(25.0));
        assert_eq!(record.order_quarter, 3);
        assert_eq!(record.passthrough, vec![Some("555-0100".to_string())]);
    }

    #[test]
    fn test_zero_msrp_yields_no_percentage() {
        let (records, zero) = derive_metrics(vec![line(2, 10.0, Some(0.0)), line(1, 10.0, Some(8.0))]);

        assert_eq!(zero, 1);
        assert_eq!(records[0].margin, Some(10.0));
        assert_eq!(records[0].margin_percentage, None);
        assert_eq!(records[1].margin_percentage, Some(25.0));
    }

    #[test]
    fn test_missing_msrp_yields_no_margin() {
        let record = enrich(line(2, 10.0, None));
        assert_eq!(record.line_total, 20.0);
        assert_eq!(record.margin, None);
        assert_eq!(record.margin_percentage, None);
    }
}
