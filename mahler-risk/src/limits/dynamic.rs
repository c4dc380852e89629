//! Regime-driven limit adjustment.
//!
//! High stress tightens limits (multipliers below 1), low stress relaxes
//! them (above 1), normal leaves them unchanged. Adjustment always produces
//! a new `RiskLimits` value from the one given; nothing is mutated in place.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RiskError, RiskResult};
use crate::regime::{MarketConditions, VolatilityRegime};

use super::checker::RiskLimits;

/// Multipliers applied to limit thresholds in one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeMultipliers {
    pub volatility: f64,
    pub value_at_risk: f64,
    pub concentration: f64,
}

impl RegimeMultipliers {
    pub const UNCHANGED: Self = Self {
        volatility: 1.0,
        value_at_risk: 1.0,
        concentration: 1.0,
    };
}

/// Regime adjustment table, keyed by regime name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeAdjustments {
    pub high: RegimeMultipliers,
    pub normal: RegimeMultipliers,
    pub low: RegimeMultipliers,
}

impl Default for RegimeAdjustments {
    fn default() -> Self {
        Self {
            high: RegimeMultipliers {
                volatility: 0.75,
                value_at_risk: 0.75,
                concentration: 0.80,
            },
            normal: RegimeMultipliers::UNCHANGED,
            low: RegimeMultipliers {
                volatility: 1.25,
                value_at_risk: 1.25,
                concentration: 1.10,
            },
        }
    }
}

impl RegimeAdjustments {
    pub fn get(&self, regime: VolatilityRegime) -> &RegimeMultipliers {
        match regime {
            VolatilityRegime::High => &self.high,
            VolatilityRegime::Normal => &self.normal,
            VolatilityRegime::Low => &self.low,
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        for regime in [VolatilityRegime::High, VolatilityRegime::Normal, VolatilityRegime::Low] {
            let m = self.get(regime);
            for value in [m.volatility, m.value_at_risk, m.concentration] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(RiskError::invalid(format!(
                        "{} regime multipliers must be positive, got {}",
                        regime.as_str(),
                        value
                    )));
                }
            }
        }
        Ok(())
    }
}

impl RiskLimits {
    /// Limits adjusted for `conditions`.
    ///
    /// Returns an unchanged copy unless `dynamic_limits` is set. Otherwise
    /// the multipliers of the more severe of the two regimes are applied to
    /// the volatility, VaR and concentration thresholds.
    pub fn adjusted_for(&self, conditions: &MarketConditions) -> RiskLimits {
        if !self.dynamic_limits {
            return self.clone();
        }

        let regime = conditions.dominant();
        let m = self.market_regime_adjustments.get(regime);

        let adjusted = RiskLimits {
            max_portfolio_volatility: self.max_portfolio_volatility * m.volatility,
            max_value_at_risk: self.max_value_at_risk * m.value_at_risk,
            max_concentration_limit: self.max_concentration_limit * m.concentration,
            ..self.clone()
        };

        info!(
            regime = regime.as_str(),
            max_volatility = adjusted.max_portfolio_volatility,
            max_var = adjusted.max_value_at_risk,
            max_concentration = adjusted.max_concentration_limit,
            "Adjusted risk limits for market regime"
        );

        adjusted
    }
}
