//! Sales ETL CLI - clean, enrich and aggregate a sales export
//!
//! # Main Commands
//!
//! ```bash
//! sales-etl transform sales_data_sample.csv    # Transform and load the four tables
//! sales-etl summary sales_data_sample.csv      # Print headline figures as JSON
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! sales-etl parse sales_data_sample.csv        # Just parse CSV to JSON
//! ```
//!
//! Output directory and source label default to `SALES_ETL_OUTPUT_DIR` and
//! `SALES_ETL_SOURCE` (read from the environment or a `.env` file).

use clap::{Parser, Subcommand};
use sales_etl::logs::{log_error, LogLevel, LOG_BROADCASTER};
use sales_etl::{
    format_delimiter, parse_csv_file_auto, run_etl, transform_csv, CsvSnapshotSink, SinkConfig,
    TransformConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sales-etl")]
#[command(about = "Clean, enrich and aggregate retail sales exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: CSV → cleaned sales + aggregates → CSV snapshots
    Transform {
        /// Input CSV file
        input: PathBuf,

        /// Snapshot directory (default: $SALES_ETL_OUTPUT_DIR or data/processed)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Source label recorded in etl_metadata (default: $SALES_ETL_SOURCE)
        #[arg(short, long)]
        source: Option<String>,

        /// Write the transform report and the stage log as JSON to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Number of top customers/products in the printed summary
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Parse a CSV file and output the raw table as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transform a CSV file and print summary statistics
    Summary {
        /// Input CSV file
        input: PathBuf,

        /// Number of top customers/products
        #[arg(long, default_value = "5")]
        top: usize,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            input,
            output_dir,
            source,
            report,
            top,
        } => cmd_transform(&input, output_dir, source, report.as_deref(), top),

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Summary { input, top } => cmd_summary(&input, top),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

fn cmd_transform(
    input: &Path,
    output_dir: Option<PathBuf>,
    source: Option<String>,
    report_path: Option<&Path>,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink_config = SinkConfig::from_env();
    if let Some(dir) = output_dir {
        sink_config.output_dir = dir;
    }
    if let Some(source) = source {
        sink_config.source = source;
    }

    let mut sink = CsvSnapshotSink::new(&sink_config.output_dir);
    let mut run_log = LOG_BROADCASTER.capture();
    let (run, metadata) = run_etl(input, &TransformConfig::default(), &mut sink, &sink_config.source)?;
    let entries = run_log.drain();
    let warnings = entries.iter().filter(|e| e.level == LogLevel::Warning).count();

    eprintln!("   Delimiter: '{}'", format_delimiter(run.csv_info.delimiter));
    eprintln!("   Tables written to: {}", sink.dir().display());
    eprintln!("   Run: {} at {}", metadata.run_id, metadata.load_timestamp.to_rfc3339());
    eprintln!("   Warnings logged: {}", warnings);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "runId": metadata.run_id,
            "report": &run.output.report,
            "log": entries,
            "logEntriesLost": run_log.lagged(),
        }))?;
        fs::write(path, json)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    let json = serde_json::to_string_pretty(&run.output.summary(top))?;
    println!("{}", json);

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.table.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.table.len());

    let json = serde_json::to_string_pretty(&result.table)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_summary(input: &Path, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    let run = transform_csv(input, &TransformConfig::default())?;

    let json = serde_json::to_string_pretty(&run.output.summary(top))?;
    println!("{}", json);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
