//! ETF strategy analysis CLI.
//!
//! Usage:
//! ```bash
//! # Compare DCA, buy-and-hold and momentum on one ETF
//! etf-backtest run --data data/QQQ.csv --start 2015-01-01 --end 2025-01-01
//!
//! # Check a price file before trusting it
//! etf-backtest validate --data data/QQQ.csv
//!
//! # Weekly return correlations across ETFs
//! etf-backtest correlate --data data/QQQ.csv --data data/SPY.csv --data data/TLT.csv
//!
//! # Daily closes with 50/200-day averages and returns
//! etf-backtest technicals --data data/QQQ.csv > qqq_technicals.csv
//!
//! # Momentum over a grid of SMA windows
//! etf-backtest sweep --data data/QQQ.csv --windows 20,50,100,200
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use etf_backtest::analytics::{technical_rows, LONG_MA, SHORT_MA};
use etf_backtest::backtest::{BacktestConfig, BacktestEngine, Evaluator, MomentumEvaluator};
use etf_backtest::data::{DataLoader, PriceSeries};
use etf_backtest::regime::BreadthFilter;
use etf_backtest::sweep::{best_by_sharpe, sweep_sma_windows};
use etf_backtest::validation::DataIntegrityValidator;
use etf_backtest::{correlation_matrix, SummaryMetrics};

#[derive(Parser)]
#[command(name = "etf-backtest")]
#[command(about = "Daily ETF strategy comparison: DCA, buy-and-hold and SMA momentum")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every strategy over one price file
    Run {
        /// Path to a daily price file (CSV or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Window start (YYYY-MM-DD), overrides the config
        #[arg(long)]
        start: Option<String>,

        /// Window end (YYYY-MM-DD), overrides the config
        #[arg(long)]
        end: Option<String>,

        /// Momentum SMA window, overrides the config
        #[arg(long)]
        sma_window: Option<usize>,

        /// Price files whose breadth gates an extra momentum run
        #[arg(long)]
        breadth: Vec<PathBuf>,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run integrity checks on price files
    Validate {
        /// Paths to daily price files
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
    },

    /// Correlation matrix of weekly returns
    Correlate {
        /// Paths to daily price files, at least two
        #[arg(short, long, required = true)]
        data: Vec<PathBuf>,
    },

    /// Print daily closes, moving averages and returns as CSV
    Technicals {
        /// Path to a daily price file
        #[arg(short, long)]
        data: PathBuf,

        /// Optional TOML configuration file (for the date window)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Short moving-average window
        #[arg(long, default_value_t = SHORT_MA)]
        short: usize,

        /// Long moving-average window
        #[arg(long, default_value_t = LONG_MA)]
        long: usize,
    },

    /// Evaluate momentum over several SMA windows in parallel
    Sweep {
        /// Path to a daily price file
        #[arg(short, long)]
        data: PathBuf,

        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated SMA windows
        #[arg(long, value_delimiter = ',', default_value = "20,50,100,150,200")]
        windows: Vec<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("etf_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            start,
            end,
            sma_window,
            breadth,
            json,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(start) = start {
                config.start_date = parse_date(&start).context("Invalid start date format")?;
            }
            if let Some(end) = end {
                config.end_date = parse_date(&end).context("Invalid end date format")?;
            }
            if let Some(window) = sma_window {
                config.sma_window = window;
            }
            run_strategies(&data, config, &breadth, json)
        }
        Commands::Validate { data } => validate_files(&data),
        Commands::Correlate { data } => correlate_files(&data),
        Commands::Technicals {
            data,
            config,
            short,
            long,
        } => print_technicals(&data, load_config(config.as_ref())?, short, long),
        Commands::Sweep {
            data,
            config,
            windows,
        } => run_sweep(&data, load_config(config.as_ref())?, &windows),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

fn load_config(path: Option<&PathBuf>) -> Result<BacktestConfig> {
    match path {
        Some(path) => BacktestConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn load_series(path: &PathBuf) -> Result<PriceSeries> {
    DataLoader::new(path)
        .load()
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn run_strategies(
    data: &PathBuf,
    config: BacktestConfig,
    breadth: &[PathBuf],
    json: bool,
) -> Result<()> {
    let raw = load_series(data)?;
    let engine = BacktestEngine::new(config).context("Invalid configuration")?;
    let cleaned = engine.prepare(&raw).context("Failed to prepare price series")?;

    info!(
        file = %data.display(),
        trading_days = cleaned.series.len(),
        filled = cleaned.filled.len(),
        "Series ready"
    );

    let mut summaries: Vec<SummaryMetrics> = Vec::new();
    let mut failures = 0usize;
    for report in engine.run_with_data(&cleaned.series)? {
        match report.outcome {
            Ok(outcome) => summaries.push(outcome.summary),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", report.strategy, e);
            }
        }
    }

    if !breadth.is_empty() {
        let basket = breadth
            .iter()
            .map(load_series)
            .collect::<Result<Vec<_>>>()?;
        let basket = engine
            .prepare_basket(&basket)
            .context("Failed to prepare breadth basket")?;
        let refs: Vec<&PriceSeries> = basket.iter().collect();
        let signal = BreadthFilter::default().build(&refs);
        info!(risk_on = signal.risk_on_fraction(), "Breadth filter built");

        let outcome = MomentumEvaluator::from_config(engine.config())
            .with_risk_on(signal)
            .evaluate(&cleaned.series)
            .context("Breadth-filtered momentum failed")?;
        let mut summary = outcome.summary;
        summary.strategy = "Momentum + Breadth".to_string();
        summaries.push(summary);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            println!("{}", summary.summary());
        }
    }

    if failures > 0 && summaries.is_empty() {
        bail!("every strategy failed");
    }
    Ok(())
}

fn validate_files(paths: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for path in paths {
        let report = DataIntegrityValidator::validate_file(path)
            .with_context(|| format!("Failed to validate {}", path.display()))?;
        println!("{}", report.summary());
        for check in &report.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            println!("  [{}] {}: {}", mark, check.name, check.message);
            if let Some(details) = &check.details {
                println!("         {}", details);
            }
        }
        if !report.all_passed() {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{} of {} files failed validation", failed, paths.len());
    }
    Ok(())
}

fn correlate_files(paths: &[PathBuf]) -> Result<()> {
    if paths.len() < 2 {
        bail!("correlation needs at least two files");
    }
    let loaded = paths
        .iter()
        .map(|p| {
            let name = p
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string());
            load_series(p).map(|s| (name, s))
        })
        .collect::<Result<Vec<_>>>()?;
    let named: Vec<(&str, &PriceSeries)> =
        loaded.iter().map(|(n, s)| (n.as_str(), s)).collect();

    let matrix = correlation_matrix(&named).context("Correlation failed")?;
    println!("{}", matrix.to_table());
    Ok(())
}

fn print_technicals(data: &PathBuf, config: BacktestConfig, short: usize, long: usize) -> Result<()> {
    let raw = load_series(data)?;
    let engine = BacktestEngine::new(config).context("Invalid configuration")?;
    let cleaned = engine.prepare(&raw).context("Failed to prepare price series")?;

    let cell = |v: Option<f64>| v.map(|x| format!("{:.6}", x)).unwrap_or_default();
    println!("date,close,ma_{},ma_{},daily_return,log_return", short, long);
    for row in technical_rows(&cleaned.series, short, long) {
        println!(
            "{},{:.4},{},{},{},{}",
            row.date,
            row.close,
            cell(row.ma_short),
            cell(row.ma_long),
            cell(row.daily_return),
            cell(row.log_return)
        );
    }
    Ok(())
}

fn run_sweep(data: &PathBuf, config: BacktestConfig, windows: &[usize]) -> Result<()> {
    let raw = load_series(data)?;
    let engine = BacktestEngine::new(config).context("Invalid configuration")?;
    let cleaned = engine.prepare(&raw).context("Failed to prepare price series")?;

    let results = sweep_sma_windows(&cleaned.series, windows, engine.config());
    println!(
        "{:>8} {:>14} {:>10} {:>10} {:>8}",
        "window", "final value", "max dd", "vol", "sharpe"
    );
    for result in &results {
        match &result.outcome {
            Ok(s) => println!(
                "{:>8} {:>14.2} {:>9.2}% {:>9.2}% {:>8}",
                result.sma_window,
                s.final_value,
                s.max_drawdown.unwrap_or(0.0) * 100.0,
                s.annualized_volatility.unwrap_or(0.0) * 100.0,
                s.sharpe_ratio
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "n/a".to_string()),
            ),
            Err(e) => println!("{:>8} error: {}", result.sma_window, e),
        }
    }
    if let Some(best) = best_by_sharpe(&results) {
        println!("\nBest SMA window by Sharpe: {}", best.sma_window);
    }
    Ok(())
}
