//! Market regime filters.
//!
//! Breadth across a basket of related series: risk-on when enough members
//! trade above their long moving average. Used to gate the momentum
//! strategy.

pub mod breadth;

pub use breadth::{BreadthFilter, BreadthFilterConfig, RiskOnSignal};
