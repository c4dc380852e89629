//! Risk budgeting module.
//!
//! Provides:
//! - Marginal risk contributions from a covariance matrix
//! - Proportional allocation of a total risk budget
//! - Utilization and per-asset concentration breaches
//! - Equal-risk-contribution target weights

pub mod engine;

pub use engine::{BudgetingConfig, RiskBudget, RiskBudgetBreach, RiskBudgeter};
