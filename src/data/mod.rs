pub mod cleaner;
pub mod loader;
pub mod types;

pub use cleaner::{next_weekday, CleanedSeries, Cleaner, GapFill, MAX_EDGE_GAP_DAYS};
pub use loader::{DataLoader, LoaderError, RawBars, EXPECTED_COLUMNS};
pub use types::{DailyReturn, DateWindow, PriceBar, PriceSeries, ReturnSeries};
