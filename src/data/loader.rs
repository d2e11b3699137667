//! Daily OHLCV file loader.
//!
//! Reads the tabular output of the fetch step (CSV or Parquet) into a
//! validated `PriceSeries`. Files carry one row per trading day with at
//! least the following columns:
//! - date (YYYY-MM-DD, or any timestamp starting with it)
//! - open, high, low, close
//! - volume
//!
//! Extra columns such as `symbol` or `adj_close` are ignored. Empty price
//! cells are forward-filled from the previous row and empty volume is 0.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AnalysisError;

use super::types::{PriceBar, PriceSeries};

/// Columns required in every input file.
pub const EXPECTED_COLUMNS: &[&str] = &["date", "open", "high", "low", "close", "volume"];

const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0} (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Parquet,
}

/// Loader for a single price file.
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Convenience wrapper for `DataLoader::new(path).load()`.
    pub fn load_path(path: impl AsRef<Path>) -> Result<PriceSeries, LoaderError> {
        Self::new(path).load()
    }

    fn format(&self) -> Result<FileFormat, LoaderError> {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("parquet") => Ok(FileFormat::Parquet),
            _ => Err(LoaderError::UnsupportedFormat(
                self.path.display().to_string(),
            )),
        }
    }

    /// Scan the file lazily.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        if !self.path.exists() {
            return Err(LoaderError::FileNotFound(self.path.display().to_string()));
        }
        let lf = match self.format()? {
            FileFormat::Csv => LazyCsvReader::new(&self.path)
                .with_has_header(true)
                .finish()?,
            FileFormat::Parquet => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?,
        };
        Ok(lf)
    }

    /// Load the file into a `DataFrame` with normalized column types,
    /// sorted by date. Empty cells are left null.
    pub fn load_dataframe(&self) -> Result<DataFrame, LoaderError> {
        let mut lf = self.load_lazy()?;

        let schema = lf.collect_schema()?;
        for name in EXPECTED_COLUMNS {
            if schema.get(*name).is_none() {
                return Err(LoaderError::MissingColumn(name.to_string()));
            }
        }

        let df = lf
            .select([
                col("date").cast(DataType::String),
                col("open").cast(DataType::Float64),
                col("high").cast(DataType::Float64),
                col("low").cast(DataType::Float64),
                col("close").cast(DataType::Float64),
                col("volume").cast(DataType::Int64),
            ])
            .sort(["date"], SortMultipleOptions::default())
            .collect()?;
        Ok(df)
    }

    /// Load the rows as bars sorted by date, without validating them.
    /// Rows with empty price cells take the previous row's values.
    pub fn load_raw(&self) -> Result<RawBars, LoaderError> {
        let df = self.load_dataframe()?;
        let (df, filled_rows) = fill_missing(&df)?;
        let bars = dataframe_to_bars(&df)?;
        let filled: Vec<NaiveDate> = filled_rows
            .into_iter()
            .filter_map(|idx| bars.get(idx).map(|b| b.date))
            .collect();

        if let Some(first) = filled.first() {
            warn!(
                path = %self.path.display(),
                filled = filled.len(),
                first_filled = %first,
                "Forward-filled empty price cells"
            );
        }
        debug!(
            path = %self.path.display(),
            rows = bars.len(),
            "Loaded price file"
        );
        Ok(RawBars { bars, filled })
    }

    /// Bars only, see [`DataLoader::load_raw`].
    pub fn load_bars(&self) -> Result<Vec<PriceBar>, LoaderError> {
        Ok(self.load_raw()?.bars)
    }

    /// Load and validate the file as a `PriceSeries`, sorted by date.
    pub fn load(&self) -> Result<PriceSeries, LoaderError> {
        Ok(PriceSeries::new(self.load_bars()?)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Bars read from one file, before series validation.
#[derive(Debug, Clone)]
pub struct RawBars {
    pub bars: Vec<PriceBar>,
    /// Dates whose empty price cells were copied from the previous row.
    pub filled: Vec<NaiveDate>,
}

/// Forward-fill empty price cells and zero empty volume. Returns the filled
/// frame and the indices of rows that had an empty price cell.
///
/// Leading empty rows have nothing to copy and stay null.
fn fill_missing(df: &DataFrame) -> Result<(DataFrame, Vec<usize>), LoaderError> {
    let prices: Vec<Float64Chunked> = PRICE_COLUMNS
        .iter()
        .map(|name| -> PolarsResult<Float64Chunked> { Ok(df.column(name)?.f64()?.clone()) })
        .collect::<PolarsResult<_>>()?;
    let filled_rows: Vec<usize> = (1..df.height())
        .filter(|&idx| prices.iter().any(|c| c.get(idx).is_none()))
        .collect();

    let filled_prices = df
        .select(PRICE_COLUMNS)?
        .fill_null(FillNullStrategy::Forward(None))?;
    let volume = df.select(["volume"])?.fill_null(FillNullStrategy::Zero)?;

    let mut out = df.select(["date"])?;
    out.hstack_mut(filled_prices.get_columns())?;
    out.hstack_mut(volume.get_columns())?;
    Ok((out, filled_rows))
}

/// Parse a date cell. Accepts plain dates and timestamps that start with one.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<PriceBar>, LoaderError> {
    let date_col = df.column("date")?.str()?;
    let open_col = df.column("open")?.f64()?;
    let high_col = df.column("high")?.f64()?;
    let low_col = df.column("low")?.f64()?;
    let close_col = df.column("close")?.f64()?;
    let volume_col = df.column("volume")?.i64()?;

    let missing = |idx: usize, name: &str| {
        LoaderError::InvalidData(format!("row {}: missing or non-numeric {}", idx, name))
    };

    let mut bars = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let raw_date = date_col.get(idx).ok_or_else(|| missing(idx, "date"))?;
        let date = parse_date(raw_date).ok_or_else(|| {
            LoaderError::InvalidData(format!("row {}: unparseable date '{}'", idx, raw_date))
        })?;

        bars.push(PriceBar {
            date,
            open: open_col.get(idx).ok_or_else(|| missing(idx, "open"))?,
            high: high_col.get(idx).ok_or_else(|| missing(idx, "high"))?,
            low: low_col.get(idx).ok_or_else(|| missing(idx, "low"))?,
            close: close_col.get(idx).ok_or_else(|| missing(idx, "close"))?,
            volume: volume_col.get(idx).ok_or_else(|| missing(idx, "volume"))?,
        });
    }

    Ok(bars)
}
