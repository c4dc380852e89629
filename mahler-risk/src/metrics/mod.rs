//! Risk metrics module.
//!
//! Provides portfolio-level risk calculations:
//! - Volatility, VaR and Expected Shortfall
//! - Sharpe ratio, Sortino ratio
//! - Maximum drawdown
//! - Beta, alpha, tracking error, information ratio

pub mod calculator;

pub use calculator::{MetricsCalculator, MetricsConfig, RiskMetrics};
