//! keymetrics CLI binary.
//!
//! Prints key financial ratios for one or more companies, fetched from
//! Financial Modeling Prep with Yahoo Finance as fallback.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keymetrics::{
    KeyMetricsOptions, MetricDefinition, MetricTable, PeriodSelection, PeriodType,
    ReportingPeriod, StatementFetcher, Symbol, TimeSeries, TimeSeriesOptions, compare_companies,
    default_definitions, get_key_metrics, get_key_metrics_timeseries, load_definitions,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keymetrics")]
#[command(about = "Key financial ratios from company statements", long_about = None)]
#[command(version)]
struct Cli {
    /// Print provider and evaluation diagnostics to stderr
    #[arg(long, global = true)]
    inspect: bool,

    /// Financial Modeling Prep API key (Yahoo Finance is used without one)
    #[arg(long, env = "FMP_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Use quarterly statements instead of annual ones
    #[arg(long, global = true)]
    quarterly: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the latest value of each metric
    Snapshot {
        /// Ticker symbol
        ticker: String,

        /// Evaluate every metric instead of only gross margin and debt ratio
        #[arg(short, long)]
        all: bool,

        /// Read metrics at this period (e.g. 2023 or 2023Q2) instead of the latest
        #[arg(short, long)]
        period: Option<ReportingPeriod>,

        /// JSON file with custom metric definitions
        #[arg(short, long)]
        definitions: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show metric history as decimal ratios
    Timeseries {
        /// Ticker symbol
        ticker: String,

        /// Periods to keep (all, latest or a count)
        #[arg(long, default_value = "all")]
        periods: PeriodSelection,

        /// JSON file with custom metric definitions
        #[arg(short, long)]
        definitions: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Compare metric history across companies
    Compare {
        /// Ticker symbols
        #[arg(value_delimiter = ',', required = true)]
        tickers: Vec<String>,

        /// Periods to keep (all, latest or a count)
        #[arg(long, default_value = "all")]
        periods: PeriodSelection,

        /// JSON file with custom metric definitions
        #[arg(short, long)]
        definitions: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the built-in metric definitions
    Metrics {
        /// Show fields and formulas
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.inspect);

    let period_type = if cli.quarterly {
        PeriodType::Quarterly
    } else {
        PeriodType::Annual
    };
    let fetcher = StatementFetcher::default_chain(cli.api_key)
        .with_period_type(period_type)
        .with_inspect(cli.inspect);

    match cli.command {
        Commands::Snapshot {
            ticker,
            all,
            period,
            definitions,
            format,
        } => {
            let mut options = KeyMetricsOptions::default()
                .with_definitions(definitions_from(definitions.as_deref())?)
                .with_mvp_only(!all);
            if let Some(period) = period {
                options = options.with_period(period);
            }
            let table = get_key_metrics(ticker.as_str(), &fetcher, &options).await;
            print_snapshot(&ticker, &table, format)?;
        }
        Commands::Timeseries {
            ticker,
            periods,
            definitions,
            format,
        } => {
            let options = TimeSeriesOptions::default()
                .with_definitions(definitions_from(definitions.as_deref())?)
                .with_selection(periods);
            let series = get_key_metrics_timeseries(ticker.as_str(), &fetcher, &options).await;
            print_timeseries(&ticker, &series, format)?;
        }
        Commands::Compare {
            tickers,
            periods,
            definitions,
            format,
        } => {
            let options = TimeSeriesOptions::default()
                .with_definitions(definitions_from(definitions.as_deref())?)
                .with_selection(periods);
            let symbols: Vec<Symbol> = tickers.iter().map(Symbol::new).collect();
            compare(&symbols, &fetcher, &options, format).await?;
        }
        Commands::Metrics { verbose } => list_metrics(verbose),
    }

    Ok(())
}

fn init_tracing(inspect: bool) {
    let default_filter = if inspect {
        "warn,keymetrics=debug,keymetrics_fmp=debug,keymetrics_yahoo=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn definitions_from(path: Option<&Path>) -> Result<Vec<MetricDefinition>> {
    match path {
        Some(path) => {
            let definitions = load_definitions(path)
                .with_context(|| format!("loading metric definitions from {}", path.display()))?;
            tracing::debug!(count = definitions.len(), path = %path.display(), "Loaded metric definitions");
            Ok(definitions)
        }
        None => Ok(default_definitions()),
    }
}

fn print_snapshot(ticker: &str, table: &MetricTable, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("\nKey metrics for {}\n", ticker.trim().to_uppercase());
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(table)?),
    }
    Ok(())
}

fn print_timeseries(ticker: &str, series: &TimeSeries, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if series.is_empty() {
                println!("No statement data for {}", ticker.trim().to_uppercase());
            } else {
                println!("{}", series.to_dataframe()?);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&series_json(series))?),
    }
    Ok(())
}

fn series_json(series: &TimeSeries) -> serde_json::Value {
    let periods: Vec<String> = series.periods().iter().map(ToString::to_string).collect();
    let metrics: serde_json::Map<String, serde_json::Value> = series
        .column_names()
        .filter_map(|key| {
            let values = series.column(key)?;
            Some((key.to_string(), json!(values)))
        })
        .collect();
    json!({ "periods": periods, "metrics": metrics })
}

async fn compare(
    symbols: &[Symbol],
    fetcher: &StatementFetcher,
    options: &TimeSeriesOptions,
    format: OutputFormat,
) -> Result<()> {
    let comparison = compare_companies(symbols, fetcher, options).await?;

    match format {
        OutputFormat::Text => {
            for (key, table) in comparison.iter() {
                println!("\n{key}");
                println!("{}", table.to_dataframe()?);
            }
        }
        OutputFormat::Json => {
            let mut out = serde_json::Map::new();
            for (key, table) in comparison.iter() {
                let periods: Vec<String> = table.periods().iter().map(ToString::to_string).collect();
                let companies: serde_json::Map<String, serde_json::Value> = table
                    .companies()
                    .filter_map(|symbol| {
                        let values = table.values(symbol)?;
                        Some((symbol.to_string(), json!(values)))
                    })
                    .collect();
                out.insert(
                    key.to_string(),
                    json!({ "periods": periods, "companies": companies }),
                );
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn list_metrics(verbose: bool) {
    println!("\nAvailable metrics:");
    println!("{}", "-".repeat(60));

    for definition in default_definitions() {
        let marker = if definition.is_mvp() { "*" } else { " " };
        println!(
            "{marker} {:18} {:14} {:6} {}",
            definition.key,
            definition.category.to_string(),
            definition.unit.as_str(),
            definition.display_name
        );
        if verbose {
            let fields: Vec<String> = definition
                .fields
                .iter()
                .map(|field| format!("{} ({})", field.name, field.statement))
                .collect();
            println!("    formula: {:?} of {}", definition.formula, fields.join(", "));
            println!("    {}", definition.description);
        }
    }

    println!("\n* included in the default snapshot (use --all for every metric)");
}
