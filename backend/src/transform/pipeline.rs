//! Transform pipeline and the extract → transform → load driver.
//!
//! ```text
//! RawTable ─▶ normalize ─▶ coerce ─▶ resolve missing ─▶ clamp ─▶ metrics ─▶ aggregate ─▶ validate
//!                                                                                 │
//!                                        TransformOutput (4 tables + report) ◀────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sales_etl::{transform_data, TransformConfig};
//!
//! let output = transform_data(Some(&raw_table), &TransformConfig::default())?;
//! println!("{} customers, {} rows dropped", output.customers.len(), output.report.dropped_rows);
//! ```

use serde::Serialize;
use std::path::Path;

use super::coerce::coerce_table;
use super::impute::resolve_missing;
use super::metrics::derive_metrics;
use super::outliers::clamp_unit_price;
use crate::aggregate::build_aggregates;
use crate::config::TransformConfig;
use crate::error::{PipelineResult, TransformError, TransformResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{RawTable, TransformOutput, TransformReport, SALES_COLUMNS};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::schema::{normalize_headers, ColumnMap, Field};
use crate::sink::{EtlMetadata, Sink};
use crate::validation::{check_consistency, scan_merge_artifacts};

/// Transform one raw table into the four output tables.
///
/// Only a missing input (or an unusable configuration) aborts; every data
/// anomaly is absorbed and accounted for in [`TransformOutput::report`].
pub fn transform_data(input: Option<&RawTable>, config: &TransformConfig) -> TransformResult<TransformOutput> {
    let table = input.ok_or(TransformError::NoInput)?;
    config.validate()?;

    let mut report = TransformReport {
        input_rows: table.len(),
        ..Default::default()
    };
    log_info(format!("🔄 Transforming {} rows × {} columns", table.len(), table.headers.len()));

    // 1. Schema
    let normalized = normalize_headers(&table.headers);
    report.renamed_columns = table
        .headers
        .iter()
        .zip(&normalized)
        .filter(|(raw, canonical)| raw != canonical)
        .map(|(raw, canonical)| (raw.clone(), canonical.clone()))
        .collect();
    log_success(format!("{} columns normalized", report.renamed_columns.len()));

    let columns = ColumnMap::resolve(&normalized);
    report.missing_columns = columns.missing_fields().iter().map(|f| f.name().to_string()).collect();
    if !report.missing_columns.is_empty() {
        log_warning(format!("Columns absent from input: {}", report.missing_columns.join(", ")));
    }
    if !columns.shadowed().is_empty() {
        report.warnings.push(format!(
            "Input columns ignored because the output already has a column of that name: {}",
            columns.shadowed().join(", ")
        ));
    }
    if !columns.contains(Field::OrderDate) {
        log_warning("No order_date column: every row will be dropped");
    }

    // 2. Types and calendar parts
    let coerced = coerce_table(table, &columns);
    for (column, count) in &coerced.failures {
        log_info_indent(format!("{}: {} unparseable values set to missing", column, count), 1);
    }
    report.coercion_failures = coerced.failures;
    let passthrough_columns = coerced.passthrough_columns;

    // 3. Missing values
    let (mut clean, imputation) = resolve_missing(coerced.rows, &config.unknown_sentinel);
    for (column, median) in &imputation.medians {
        log_info(format!("Missing {} replaced by the median {}", column, median));
    }
    for (column, count) in &imputation.repaired_values {
        log_info_indent(format!("{}: {} values repaired", column, count), 1);
    }
    if imputation.dropped_rows > 0 {
        log_warning(format!("Dropped {} rows with a missing order_date", imputation.dropped_rows));
    }
    report.missing_values = imputation.missing_values;
    report.repaired_values = imputation.repaired_values;
    report.medians = imputation.medians;
    report.dropped_rows = imputation.dropped_rows;

    // 4. Outliers
    report.outliers = clamp_unit_price(&mut clean, config);
    log_info(format!(
        "{} outliers in unit_price clamped to [{}, {}]",
        report.outliers.clamped, report.outliers.lower_bound, report.outliers.upper_bound
    ));

    // 5. Derived metrics
    let (sales, zero_msrp) = derive_metrics(clean);
    report.zero_msrp_rows = zero_msrp;
    report.output_rows = sales.len();
    if zero_msrp > 0 {
        report
            .warnings
            .push(format!("{} rows have suggested_retail_price = 0; margin_percentage left empty", zero_msrp));
    }

    // 6. Aggregates
    let aggregates = build_aggregates(&sales);
    log_success(format!(
        "{} customers, {} products, {} months",
        aggregates.customers.len(),
        aggregates.products.len(),
        aggregates.time.len()
    ));
    if aggregates.time_fallback_rows > 0 {
        report.warnings.push(format!(
            "{} rows lack year/month and were grouped by order_date",
            aggregates.time_fallback_rows
        ));
    }

    // 7. Validation
    let sales_columns: Vec<String> = SALES_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(passthrough_columns.iter().cloned())
        .collect();
    let mut tables: Vec<(&str, &[String])> = vec![("sales_data", sales_columns.as_slice())];
    tables.extend(aggregates.columns.iter().map(|(t, c)| (*t, c.as_slice())));
    let artifacts = scan_merge_artifacts(tables);
    if !artifacts.is_empty() {
        report
            .warnings
            .push(format!("Columns with merge suffixes detected: {}", artifacts.join(", ")));
    }
    report.warnings.extend(check_consistency(
        &sales,
        &aggregates.customers,
        &aggregates.products,
        &aggregates.time,
    ));

    if report.warnings.is_empty() {
        log_success("No data-quality warnings");
    } else {
        for warning in &report.warnings {
            log_warning(warning.clone());
        }
    }
    log_success(format!("Transformed {} → {} rows", report.input_rows, report.output_rows));

    Ok(TransformOutput {
        sales,
        passthrough_columns,
        customers: aggregates.customers,
        products: aggregates.products,
        time: aggregates.time,
        report,
    })
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for CsvInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.table.headers.clone(),
            row_count: parsed.table.len(),
        }
    }
}

/// Extraction metadata plus transform output.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub csv_info: CsvInfo,
    pub output: TransformOutput,
}

/// Parse a CSV export and transform it.
pub fn transform_csv(path: &Path, config: &TransformConfig) -> PipelineResult<PipelineRun> {
    log_info(format!("📖 Reading {}", path.display()));
    let parsed = parse_csv_file_auto(path)?;
    transform_parsed(parsed, config)
}

/// Same as [`transform_csv`] for an in-memory export.
pub fn transform_bytes(bytes: &[u8], config: &TransformConfig) -> PipelineResult<PipelineRun> {
    let parsed = parse_bytes_auto(bytes)?;
    transform_parsed(parsed, config)
}

fn transform_parsed(parsed: ParseResult, config: &TransformConfig) -> PipelineResult<PipelineRun> {
    let csv_info = CsvInfo::from(&parsed);
    log_success(format!("Detected encoding: {}", csv_info.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(csv_info.delimiter)));
    log_success(format!("Read {} rows", csv_info.row_count));

    let output = transform_data(Some(&parsed.table), config)?;
    Ok(PipelineRun { csv_info, output })
}

/// Full run: extract, transform, and hand the four tables to `sink`.
pub fn run_etl<S: Sink>(
    path: &Path,
    config: &TransformConfig,
    sink: &mut S,
    source: &str,
) -> PipelineResult<(PipelineRun, EtlMetadata)> {
    let run = transform_csv(path, config)?;
    log_info("💾 Loading tables...");
    let metadata = sink.load(&run.output, source)?;
    log_success(format!("Loaded {} rows (run {})", metadata.rows_loaded, metadata.run_id));
    Ok((run, metadata))
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    const HEADERS: &[&str] = &[
        "ORDERNUMBER",
        "QUANTITYORDERED",
        "PRICEEACH",
        "ORDERLINENUMBER",
        "ORDERDATE",
        "MONTH_ID",
        "YEAR_ID",
        "PRODUCTCODE",
        "MSRP",
        "CUSTOMERNAME",
        "DEALSIZE",
    ];

    fn run(rows: &[&[&str]]) -> TransformOutput {
        let table = RawTable::from_rows(HEADERS, rows);
        transform_data(Some(&table), &TransformConfig::default()).unwrap()
    }

    #[test]
    fn test_no_input_aborts() {
        let err = transform_data(None, &TransformConfig::default()).unwrap_err();
        assert!(matches!(err, TransformError::NoInput));
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = TransformConfig { lower_quantile: 2.0, ..Default::default() };
        let table = RawTable::from_rows(HEADERS, &[]);
        assert!(matches!(
            transform_data(Some(&table), &config),
            Err(TransformError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_acme_scenario() {
        let output = run(&[
            &["1", "2", "10", "1", "2/24/2003 0:00", "2", "2003", "S10_1678", "12", "Acme", "Small"],
            &["1", "3", "10", "2", "2/24/2003 0:00", "2", "2003", "S10_1678", "12", "Acme", "Small"],
            &["2", "5", "10", "1", "3/3/2003 0:00", "3", "2003", "S10_1678", "12", "Acme", "Small"],
        ]);

        assert_eq!(output.customers.len(), 1);
        let acme = &output.customers[0];
        assert_eq!(acme.customer_name, "Acme");
        assert_eq!(acme.total_quantity, 10);
        assert_eq!(acme.total_sales, 100.0);
        assert_eq!(acme.total_orders, 2);
        assert_eq!(acme.customer_lifetime_days, 7);
    }

    #[test]
    fn test_empty_date_drops_row_empty_price_is_imputed() {
        let output = run(&[
            &["1", "2", "10", "1", "", "2", "2003", "P1", "12", "Acme", "Small"],
            &["1", "2", "", "1", "2/24/2003 0:00", "2", "2003", "P1", "12", "Acme", "Small"],
            &["2", "2", "30", "1", "2/25/2003 0:00", "2", "2003", "P1", "12", "Acme", "Small"],
            &["3", "2", "20", "1", "2/26/2003 0:00", "2", "2003", "P1", "12", "Acme", "Small"],
        ]);

        assert_eq!(output.report.dropped_rows, 1);
        assert_eq!(output.sales.len(), 3);
        // Median of [10, 30, 20] computed before rows were dropped
        assert_eq!(output.sales[0].unit_price, 20.0);
        assert_eq!(output.report.repaired_values.get("unit_price"), Some(&1));
    }

    #[test]
    fn test_unparseable_dates_are_counted_as_dropped() {
        let output = run(&[
            &["1", "1", "10", "1", "someday", "2", "2003", "P1", "12", "Acme", "Small"],
            &["2", "1", "10", "1", "2/31/2003", "2", "2003", "P1", "12", "Acme", "Small"],
            &["3", "1", "10", "1", "2003-02-03", "2", "2003", "P1", "12", "Acme", "Small"],
        ]);

        assert_eq!(output.report.dropped_rows, 2);
        assert_eq!(output.report.coercion_failures.get("order_date"), Some(&2));
        assert!(output.sales.iter().all(|r| r.order_date == NaiveDate::from_ymd_opt(2003, 2, 3).unwrap()));
    }

    #[test]
    fn test_zero_msrp_completes_with_empty_percentage() {
        let output = run(&[
            &["1", "2", "10", "1", "2/24/2003 0:00", "2", "2003", "X99", "0", "Acme", "Small"],
            &["2", "4", "10", "1", "2/24/2003 0:00", "2", "2003", "X99", "0", "Acme", "Small"],
        ]);

        assert!(output.sales.iter().all(|r| r.margin_percentage.is_none()));
        assert_eq!(output.report.zero_msrp_rows, 2);
        assert!(output.report.warnings.iter().any(|w| w.contains("suggested_retail_price = 0")));
        assert_eq!(output.products[0].product_code, "X99");
    }

    #[test]
    fn test_line_total_and_price_fences_hold() {
        let prices = ["10", "11", "12", "13", "14", "15", "500"];
        let rows: Vec<Vec<&str>> = prices
            .iter()
            .map(|p| vec!["1", "3", *p, "1", "2003-01-06", "1", "2003", "P1", "12", "Acme", "Small"])
            .collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let output = run(&row_refs);

        let outliers = &output.report.outliers;
        assert_eq!(outliers.clamped, 1);
        for record in &output.sales {
            assert!((record.line_total - record.quantity as f64 * record.unit_price).abs() < 1e-9);
            assert!(record.unit_price >= outliers.lower_bound && record.unit_price <= outliers.upper_bound);
        }
    }

    #[test]
    fn test_conservation_and_product_coverage() {
        let output = run(&[
            &["1", "2", "10.5", "1", "2003-01-06", "1", "2003", "P1", "12", "Acme", "Small"],
            &["2", "3", "11", "1", "2003-02-06", "2", "2003", "", "12", "Zeta", "Small"],
            &["3", "1", "9.25", "1", "2003-02-07", "2", "2003", "P2", "12", "", "Small"],
        ]);

        let sales_total: f64 = output.sales.iter().map(|r| r.line_total).sum();
        let customer_total: f64 = output.customers.iter().map(|c| c.total_sales).sum();
        assert!((sales_total - customer_total).abs() < 1e-9);

        let sold: HashSet<_> = output.sales.iter().map(|r| r.product_code.clone()).collect();
        let aggregated: HashSet<_> = output.products.iter().map(|p| p.product_code.clone()).collect();
        assert_eq!(sold, aggregated);
        assert!(aggregated.contains("Unknown"));
        assert!(output.customers.iter().any(|c| c.customer_name == "Unknown"));
        assert!(output.report.warnings.is_empty());
    }

    #[test]
    fn test_transform_is_repeatable() {
        let rows: &[&[&str]] = &[
            &["1", "2", "10.1", "1", "2003-01-06", "1", "2003", "P1", "12", "Acme", "Small"],
            &["2", "", "99.9", "1", "2003-02-06", "2", "2003", "P2", "12", "Zeta", "Small"],
            &["3", "7", "0.3", "1", "2003-02-07", "2", "2003", "P1", "12", "Acme", "Large"],
        ];
        let first = run(rows);
        let second = run(rows);

        assert_eq!(first.customers, second.customers);
        assert_eq!(first.products, second.products);
        assert_eq!(first.time, second.time);
        assert_eq!(first.sales, second.sales);
    }

    #[test]
    fn test_time_aggregate_uses_export_month() {
        let output = run(&[
            &["1", "1", "10", "1", "2003-01-31", "2", "2003", "P1", "12", "Acme", "Small"],
            &["2", "1", "10", "1", "2003-02-01", "2", "2003", "P1", "12", "Acme", "Small"],
        ]);

        assert_eq!(output.time.len(), 1);
        assert_eq!((output.time[0].year, output.time[0].month), (2003, 2));
        assert_eq!(output.time[0].order_count, 2);
    }

    #[test]
    fn test_transform_bytes_with_passthrough_column() {
        let csv = "ORDERNUMBER,QUANTITYORDERED,PRICEEACH,ORDERDATE,PRODUCTCODE,CUSTOMERNAME,PHONE\n\
                   10107,30,95.70,2/24/2003 0:00,S10_1678,Land of Toys Inc.,2125557818\n";
        let run = transform_bytes(csv.as_bytes(), &TransformConfig::default()).unwrap();

        assert_eq!(run.csv_info.delimiter, ',');
        assert_eq!(run.output.passthrough_columns, vec!["phone"]);
        assert_eq!(run.output.sales[0].passthrough, vec![Some("2125557818".to_string())]);
        assert_eq!(run.output.sales[0].line_total, 30.0 * 95.70);
    }

    #[test]
    fn test_input_line_total_is_recomputed_not_carried() {
        let csv = "ORDERNUMBER,QUANTITYORDERED,PRICEEACH,ORDERDATE,PRODUCTCODE,CUSTOMERNAME,LINE_TOTAL,PHONE\n\
                   10107,2,10,2/24/2003 0:00,S10_1678,Acme,999999,2125557818\n";
        let run = transform_bytes(csv.as_bytes(), &TransformConfig::default()).unwrap();
        let output = &run.output;

        assert_eq!(output.sales[0].line_total, 20.0);
        assert_eq!(output.passthrough_columns, vec!["phone"]);
        assert!(output.report.warnings.iter().any(|w| w.contains("line_total")));

        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = crate::sink::CsvSnapshotSink::new(dir.path());
        sink.load(output, "sales.csv").unwrap();

        let mut reader = csv::Reader::from_path(sink.table_path(crate::sink::SALES_TABLE)).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.iter().filter(|h| *h == "line_total").count(), 1);
        let row = reader.records().next().unwrap().unwrap();
        assert!(row.iter().all(|cell| cell != "999999"));
    }

    #[test]
    fn test_run_log_captures_stage_warnings() {
        let mut run_log = crate::logs::LOG_BROADCASTER.capture();
        let csv = "ORDERNUMBER,QUANTITYORDERED,PRICEEACH,ORDERDATE,PRODUCTCODE,CUSTOMERNAME,LINE_TOTAL\n\
                   10107,2,10,2/24/2003 0:00,S10_1678,Acme,999999\n";
        transform_bytes(csv.as_bytes(), &TransformConfig::default()).unwrap();

        // Other tests share the broadcaster, so only look for this run's warning
        let entries = run_log.drain();
        assert!(entries.iter().any(|e| {
            e.level == crate::logs::LogLevel::Warning && e.message.contains("already has a column of that name")
        }));
    }

    #[test]
    fn test_huge_quantities_are_imputed() {
        let csv = "ORDERNUMBER,QUANTITYORDERED,PRICEEACH,ORDERDATE,PRODUCTCODE,CUSTOMERNAME\n\
                   1,9e18,10,2003-01-06,P1,Acme\n\
                   2,9e18,10,2003-01-07,P1,Acme\n\
                   3,5,10,2003-01-08,P1,Acme\n";
        let run = transform_bytes(csv.as_bytes(), &TransformConfig::default()).unwrap();
        let output = &run.output;

        assert_eq!(output.report.coercion_failures.get("quantity"), Some(&2));
        assert!(output.sales.iter().all(|r| r.quantity == 5));
        assert_eq!(output.customers[0].total_quantity, 15);
        assert_eq!(output.products[0].total_quantity, 15);
    }

    #[test]
    fn test_run_etl_loads_into_sink() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "ORDERNUMBER;QUANTITYORDERED;PRICEEACH;ORDERDATE;PRODUCTCODE;CUSTOMERNAME\n\
             10107;30;95.70;2/24/2003 0:00;S10_1678;Land of Toys Inc.\n\
             10121;34;81.35;5/7/2003 0:00;S10_1678;Reims Collectables\n",
        )
        .unwrap();

        let mut sink = crate::sink::MemorySink::default();
        let (run, metadata) = run_etl(&path, &TransformConfig::default(), &mut sink, "sales.csv").unwrap();

        assert_eq!(run.csv_info.delimiter, ';');
        assert_eq!(metadata.rows_loaded, 2);
        assert_eq!(metadata.source, "sales.csv");
        assert_eq!(sink.loads.len(), 1);
        assert_eq!(sink.loads[0].1.products.len(), 1);
    }
}
