//! Risk limit compliance checks.
//!
//! Compares a `RiskMetrics` snapshot and the current weights against
//! `RiskLimits`:
//! - Portfolio volatility
//! - Value at Risk
//! - Maximum drawdown
//! - Single-position concentration
//! - Diversification ratio

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::PortfolioWeights;
use crate::error::{RiskError, RiskResult};
use crate::metrics::RiskMetrics;

use super::dynamic::RegimeAdjustments;

/// Risk limit thresholds. Owned by the caller; adjusted copies are produced
/// by `RiskLimits::adjusted_for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum annualized portfolio volatility.
    pub max_portfolio_volatility: f64,
    /// Maximum one-period VaR as a fraction of portfolio value.
    pub max_value_at_risk: f64,
    /// Maximum peak-to-trough drawdown.
    pub max_drawdown_limit: f64,
    /// Maximum weight of any single position.
    pub max_concentration_limit: f64,
    /// Minimum diversification ratio for multi-asset portfolios.
    pub min_diversification_ratio: f64,
    /// Maximum tolerated stress scenario loss.
    pub stress_test_threshold: f64,
    /// Whether limits follow market regime adjustments.
    pub dynamic_limits: bool,
    /// Multipliers applied per regime when `dynamic_limits` is set.
    pub market_regime_adjustments: RegimeAdjustments,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_portfolio_volatility: 0.20,
            max_value_at_risk: 0.05,
            max_drawdown_limit: 0.15,
            max_concentration_limit: 0.25,
            min_diversification_ratio: 1.1,
            stress_test_threshold: 0.15,
            dynamic_limits: true,
            market_regime_adjustments: RegimeAdjustments::default(),
        }
    }
}

impl RiskLimits {
    /// Reject structurally invalid thresholds.
    pub fn validate(&self) -> RiskResult<()> {
        let thresholds = [
            ("max_portfolio_volatility", self.max_portfolio_volatility),
            ("max_value_at_risk", self.max_value_at_risk),
            ("max_drawdown_limit", self.max_drawdown_limit),
            ("max_concentration_limit", self.max_concentration_limit),
            ("stress_test_threshold", self.stress_test_threshold),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(RiskError::invalid(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(self.min_diversification_ratio.is_finite() && self.min_diversification_ratio >= 0.0) {
            return Err(RiskError::invalid(format!(
                "min_diversification_ratio must be non-negative, got {}",
                self.min_diversification_ratio
            )));
        }
        self.market_regime_adjustments.validate()
    }
}

/// Kind of limit that was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    PortfolioVolatility,
    ValueAtRisk,
    MaximumDrawdown,
    ConcentrationLimit,
    DiversificationRatio,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortfolioVolatility => "portfolio_volatility",
            Self::ValueAtRisk => "value_at_risk",
            Self::MaximumDrawdown => "maximum_drawdown",
            Self::ConcentrationLimit => "concentration_limit",
            Self::DiversificationRatio => "diversification_ratio",
        }
    }

    /// Recommended remediation for a breach of this limit.
    pub fn recommended_action(&self) -> &'static str {
        match self {
            Self::PortfolioVolatility => {
                "Reduce exposure to high-beta and high-volatility positions"
            }
            Self::ValueAtRisk => "Reduce gross exposure or add hedges to cut tail risk",
            Self::MaximumDrawdown => "Cut losing positions and tighten stop losses",
            Self::ConcentrationLimit => "Trim the largest position below the concentration limit",
            Self::DiversificationRatio => "Add uncorrelated assets to improve diversification",
        }
    }
}

/// A single limit breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBreach {
    pub limit_type: LimitType,
    pub current_value: f64,
    pub limit_value: f64,
    /// Offending symbol, for position-level limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Result of a limit check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitCheckResult {
    pub compliant: bool,
    pub breaches: Vec<LimitBreach>,
    pub recommended_actions: Vec<String>,
}

impl LimitCheckResult {
    pub fn breach(&self, limit_type: LimitType) -> Option<&LimitBreach> {
        self.breaches.iter().find(|b| b.limit_type == limit_type)
    }
}

/// Risk limits checker.
pub struct RiskLimitsChecker;

impl RiskLimitsChecker {
    /// Check metrics and weights against limits.
    pub fn check(
        metrics: &RiskMetrics,
        weights: &PortfolioWeights,
        limits: &RiskLimits,
    ) -> LimitCheckResult {
        let mut breaches = Vec::new();

        if metrics.volatility > limits.max_portfolio_volatility {
            breaches.push(LimitBreach {
                limit_type: LimitType::PortfolioVolatility,
                current_value: metrics.volatility,
                limit_value: limits.max_portfolio_volatility,
                symbol: None,
            });
        }

        if metrics.value_at_risk > limits.max_value_at_risk {
            breaches.push(LimitBreach {
                limit_type: LimitType::ValueAtRisk,
                current_value: metrics.value_at_risk,
                limit_value: limits.max_value_at_risk,
                symbol: None,
            });
        }

        if metrics.maximum_drawdown > limits.max_drawdown_limit {
            breaches.push(LimitBreach {
                limit_type: LimitType::MaximumDrawdown,
                current_value: metrics.maximum_drawdown,
                limit_value: limits.max_drawdown_limit,
                symbol: None,
            });
        }

        let largest = weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((symbol, weight)) = largest {
            if *weight > limits.max_concentration_limit {
                breaches.push(LimitBreach {
                    limit_type: LimitType::ConcentrationLimit,
                    current_value: *weight,
                    limit_value: limits.max_concentration_limit,
                    symbol: Some(symbol.clone()),
                });
            }
        }

        // Diversification is only meaningful across several risky positions.
        let positions = weights.values().filter(|w| **w > 0.0).count();
        if positions >= 2
            && metrics.volatility > 0.0
            && metrics.diversification_ratio < limits.min_diversification_ratio
        {
            breaches.push(LimitBreach {
                limit_type: LimitType::DiversificationRatio,
                current_value: metrics.diversification_ratio,
                limit_value: limits.min_diversification_ratio,
                symbol: None,
            });
        }

        let recommended_actions = breaches
            .iter()
            .map(|b| b.limit_type.recommended_action().to_string())
            .collect();

        debug!(breaches = breaches.len(), "Checked risk limits");

        LimitCheckResult {
            compliant: breaches.is_empty(),
            breaches,
            recommended_actions,
        }
    }
}
