use clap::{Parser, Subcommand};
use colored::*;
use perfil::config::{DATA_SUBDIR, REPORT_SUBDIR};
use perfil::report::{ReportGenerator, TableReporter};
use perfil::store::{FunctionLog, TimeSeriesDataset, LOG_FILE, TIME_SERIES_FILE};
use std::path::PathBuf;
use std::process::exit;
use tabled::{settings::Style, Table, Tabled};

/// Render reports and summaries from recorded profiling data
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Report directory the profiled application wrote to
    #[clap(short, long, value_name = "DIR", default_value = "reports")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regenerate report artifacts from the persisted datasets
    Report,

    /// Print a per-function summary to the terminal
    Show {
        /// Only show entries for this function name
        #[clap(short, long)]
        function: Option<String>,
    },
}

#[derive(Tabled)]
struct ShowRow {
    #[tabled(rename = "function")]
    function: String,
    #[tabled(rename = "location")]
    location: String,
    #[tabled(rename = "calls")]
    calls: usize,
    #[tabled(rename = "last exec (s)")]
    execution_time: f64,
    #[tabled(rename = "last peak mem (MB)")]
    peak_memory_mb: f64,
    #[tabled(rename = "last cpu (%)")]
    cpu_usage: f64,
}

fn main() {
    let args = Args::parse();
    let data_dir = args.dir.join(DATA_SUBDIR);

    match &args.command {
        Commands::Report => {
            let artifact_dir = args.dir.join(REPORT_SUBDIR);
            match TableReporter::new().generate(&data_dir, &artifact_dir) {
                Ok(()) => {
                    println!(
                        "Reports written to {}",
                        artifact_dir.display().to_string().green()
                    );
                }
                Err(err) => {
                    eprintln!("Error generating reports: {err}");
                    exit(1);
                }
            }
        }
        Commands::Show { function } => {
            let log = load_dataset::<FunctionLog>(&data_dir.join(LOG_FILE));
            let series = load_dataset::<TimeSeriesDataset>(&data_dir.join(TIME_SERIES_FILE));

            if log.is_empty() {
                println!("No profiling data found under {}", args.dir.display());
                return;
            }

            let mut latest = std::collections::BTreeMap::new();
            for entry in &log {
                latest.insert(entry.function_key(), entry);
            }

            let rows: Vec<ShowRow> = latest
                .into_iter()
                .filter(|(_, entry)| {
                    function
                        .as_ref()
                        .map(|name| entry.function_name == *name)
                        .unwrap_or(true)
                })
                .map(|(key, entry)| ShowRow {
                    function: entry.function_name.clone(),
                    location: entry.source_location.clone(),
                    calls: series.get(&key).map_or(1, Vec::len),
                    execution_time: entry.execution_time,
                    peak_memory_mb: entry.peak_memory_mb,
                    cpu_usage: entry.cpu_usage,
                })
                .collect();

            if rows.is_empty() {
                println!(
                    "No entries for function {}",
                    function.as_deref().unwrap_or("?").cyan()
                );
                return;
            }

            println!("{}", Table::new(rows).with(Style::sharp()));
            println!(
                "{} entries recorded in total",
                log.len().to_string().cyan()
            );
        }
    }
}

fn load_dataset<T: serde::de::DeserializeOwned + Default>(path: &std::path::Path) -> T {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            eprintln!("Warning: could not parse {}: {err}", path.display());
            T::default()
        }),
        Err(_) => T::default(),
    }
}
