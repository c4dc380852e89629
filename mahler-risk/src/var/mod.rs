//! Value-at-Risk module.
//!
//! Provides:
//! - Historical, parametric and Monte Carlo VaR
//! - Expected Shortfall (CVaR) for each method
//! - Square-root-of-time horizon scaling

pub mod engine;

pub use engine::{
    HistoricalEstimate, VaRCalculation, VarAssumptions, VarEngine, VarMethod, VarParams,
    DEFAULT_SEED, DEFAULT_SIMULATIONS,
};
