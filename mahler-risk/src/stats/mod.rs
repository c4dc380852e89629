//! Statistics kernel.
//!
//! Pure numeric routines shared by every risk component:
//! - Mean, variance, covariance, correlation
//! - Percentiles (historical simulation)
//! - Drawdown, Sharpe, Sortino
//! - Benchmark regression (beta, alpha, tracking error)

pub mod descriptive;
pub mod regression;

pub use descriptive::{
    correlation, covariance, covariance_matrix, downside_deviation, max_drawdown, mean,
    percentile, percentile_sorted, sharpe_ratio, sortino_ratio, std_dev, variance, MAX_DRAWDOWN,
};
pub use regression::{regress, BenchmarkRegression};
