//! Rebalancing signal generation.
//!
//! Diffs current against target weights into prioritized trades and an
//! implementation plan. The risk-impact estimates are policy heuristics that
//! grow with the number of trades and are capped.

use std::collections::BTreeSet;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{PortfolioWeights, SignalDirection};
use crate::error::{RiskError, RiskResult};

/// Rebalancing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Drift at or below which no trade is generated.
    pub drift_tolerance: f64,
    /// Drift above which a trade is urgent.
    pub urgent_drift: f64,
    /// Transaction cost as a fraction of traded value.
    pub transaction_cost_rate: f64,
    pub risk_reduction_per_signal: f64,
    pub max_risk_reduction: f64,
    pub diversification_per_signal: f64,
    pub max_diversification_improvement: f64,
    /// Signal count above which a non-urgent plan is scheduled near term.
    pub near_term_signal_count: usize,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: 0.0,
            urgent_drift: 0.05,
            transaction_cost_rate: 0.001,
            risk_reduction_per_signal: 0.02,
            max_risk_reduction: 0.10,
            diversification_per_signal: 0.01,
            max_diversification_improvement: 0.05,
            near_term_signal_count: 3,
        }
    }
}

impl RebalanceConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if self.drift_tolerance < 0.0 || self.urgent_drift < 0.0 {
            return Err(RiskError::invalid("drift thresholds must be non-negative"));
        }
        if self.transaction_cost_rate < 0.0 {
            return Err(RiskError::invalid("transaction_cost_rate must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Urgent,
}

/// A single rebalancing trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceSignal {
    pub symbol: String,
    /// Buy when underweight, sell when overweight.
    pub direction: SignalDirection,
    pub current_weight: f64,
    pub target_weight: f64,
    pub reason: String,
    /// 1 is the largest drift.
    pub priority: usize,
    pub urgency: Urgency,
    pub estimated_cost: Decimal,
}

impl RebalanceSignal {
    pub fn drift(&self) -> f64 {
        self.current_weight - self.target_weight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Immediate,
    NearTerm,
    Opportunistic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskImpact {
    pub expected_risk_reduction: f64,
    pub diversification_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    pub timeline: Timeline,
    pub estimated_cost: Decimal,
    pub risk_impact: RiskImpact,
}

/// Rebalancing trades with their implementation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancePlan {
    /// Ordered by priority.
    pub signals: Vec<RebalanceSignal>,
    pub implementation: ImplementationPlan,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Generates rebalancing plans.
#[derive(Debug, Clone, Default)]
pub struct RebalanceGenerator {
    config: RebalanceConfig,
}

impl RebalanceGenerator {
    pub fn new(config: RebalanceConfig) -> Self {
        Self { config }
    }

    /// Diff `current` against `targets` for a portfolio worth `total_value`.
    /// Symbols absent from either side have weight 0 there.
    pub fn generate(
        &self,
        current: &PortfolioWeights,
        targets: &PortfolioWeights,
        total_value: Decimal,
    ) -> RebalancePlan {
        let symbols: BTreeSet<&String> = current.keys().chain(targets.keys()).collect();
        let rate = Decimal::from_f64(self.config.transaction_cost_rate).unwrap_or(Decimal::ZERO);

        let mut signals: Vec<RebalanceSignal> = symbols
            .into_iter()
            .filter_map(|symbol| {
                let current_weight = current.get(symbol).copied().unwrap_or(0.0);
                let target_weight = targets.get(symbol).copied().unwrap_or(0.0);
                let drift = current_weight - target_weight;
                if drift.abs() <= self.config.drift_tolerance {
                    return None;
                }

                let (direction, side) = if drift > 0.0 {
                    (SignalDirection::Sell, "Overweight")
                } else {
                    (SignalDirection::Buy, "Underweight")
                };
                let traded = Decimal::from_f64(drift.abs()).unwrap_or(Decimal::ZERO) * total_value;

                Some(RebalanceSignal {
                    symbol: symbol.clone(),
                    direction,
                    current_weight,
                    target_weight,
                    reason: format!(
                        "{} by {:.2}% (current {:.2}%, target {:.2}%)",
                        side,
                        drift.abs() * 100.0,
                        current_weight * 100.0,
                        target_weight * 100.0
                    ),
                    priority: 0,
                    urgency: if drift.abs() > self.config.urgent_drift {
                        Urgency::Urgent
                    } else {
                        Urgency::Normal
                    },
                    estimated_cost: (traded * rate).round_dp(2),
                })
            })
            .collect();

        // Stable: equal drifts keep symbol order
        signals.sort_by(|a, b| b.drift().abs().total_cmp(&a.drift().abs()));
        for (i, signal) in signals.iter_mut().enumerate() {
            signal.priority = i + 1;
        }

        let implementation = self.plan(&signals);
        debug!(
            signals = signals.len(),
            timeline = ?implementation.timeline,
            "Generated rebalance plan"
        );

        RebalancePlan {
            signals,
            implementation,
        }
    }

    fn plan(&self, signals: &[RebalanceSignal]) -> ImplementationPlan {
        let timeline = if signals.iter().any(|s| s.urgency == Urgency::Urgent) {
            Timeline::Immediate
        } else if signals.len() > self.config.near_term_signal_count {
            Timeline::NearTerm
        } else {
            Timeline::Opportunistic
        };

        let n = signals.len() as f64;
        ImplementationPlan {
            timeline,
            estimated_cost: signals.iter().map(|s| s.estimated_cost).sum(),
            risk_impact: RiskImpact {
                expected_risk_reduction: (n * self.config.risk_reduction_per_signal)
                    .min(self.config.max_risk_reduction),
                diversification_improvement: (n * self.config.diversification_per_signal)
                    .min(self.config.max_diversification_improvement),
            },
        }
    }
}
