//! Market regime classification module.
//!
//! Categorizes market conditions from the portfolio return stream:
//! - Volatility regime: realized volatility vs. low/high thresholds
//! - Market stress: trailing drawdown vs. low/high thresholds
//!
//! Regimes feed the dynamic risk limit adjuster.

pub mod classifier;

pub use classifier::{
    MarketConditions, RegimeClassifier, RegimeClassifierConfig, RegimeStats, VolatilityRegime,
};
