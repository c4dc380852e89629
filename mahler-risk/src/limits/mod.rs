//! Risk limits module.
//!
//! Provides:
//! - Limit compliance checks with structured breaches and remediation
//! - Regime-driven dynamic limit adjustment

pub mod checker;
pub mod dynamic;

pub use checker::{LimitBreach, LimitCheckResult, LimitType, RiskLimits, RiskLimitsChecker};
pub use dynamic::{RegimeAdjustments, RegimeMultipliers};
