//! Scenario-based stress testing.
//!
//! Applies externally authored shock scenarios to the baseline risk metrics
//! of a portfolio, classifies the severity of each outcome, and aggregates
//! worst-case and probability-weighted losses.
//!
//! | Scenario loss | Severity |
//! |---------------|----------|
//! | >= 20%        | critical |
//! | >= 10%        | high     |
//! | >= 5%         | medium   |
//! | otherwise     | low      |

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{PortfolioWeights, ReturnSeries};
use crate::error::{RiskError, RiskResult};
use crate::limits::RiskLimits;
use crate::metrics::{MetricsCalculator, RiskMetrics};
use crate::stats::MAX_DRAWDOWN;

/// Deltas a scenario applies to the baseline metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioImpact {
    /// Portfolio return under the scenario (negative for a loss).
    pub portfolio_return: f64,
    /// Added to baseline annualized volatility.
    pub portfolio_volatility: f64,
    /// Added to baseline one-period VaR.
    pub value_at_risk: f64,
    /// Added to baseline maximum drawdown.
    pub drawdown: f64,
}

/// A named shock scenario authored by risk operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Category of shock (e.g., "market_crash", "interest_rate").
    pub shock_type: String,
    /// Free-form numeric parameters describing the shock.
    #[serde(default)]
    pub shock_parameters: BTreeMap<String, f64>,
    /// Probability of the scenario over the planning horizon.
    #[serde(default)]
    pub probability: f64,
    pub impact: ScenarioImpact,
    /// Expected recovery time in trading days.
    #[serde(default)]
    pub recovery_time: u32,
}

/// Severity of a scenario outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Stress testing configuration.
///
/// Severity thresholds are loss magnitudes. They are policy choices, not
/// derived quantities, and can be overridden per deployment. The engine
/// config requires `critical_loss >= stress_test_threshold`, so a critical
/// scenario always fails the stress test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub critical_loss: f64,
    pub high_loss: f64,
    pub medium_loss: f64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            critical_loss: 0.20,
            high_loss: 0.10,
            medium_loss: 0.05,
        }
    }
}

impl StressConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.medium_loss > 0.0
            && self.medium_loss <= self.high_loss
            && self.high_loss <= self.critical_loss)
        {
            return Err(RiskError::invalid(format!(
                "severity thresholds must satisfy 0 < medium <= high <= critical, got {} / {} / {}",
                self.medium_loss, self.high_loss, self.critical_loss
            )));
        }
        Ok(())
    }

    /// Classify a scenario return by its loss magnitude.
    pub fn classify(&self, portfolio_return: f64) -> Severity {
        let loss = (-portfolio_return).max(0.0);
        if loss >= self.critical_loss {
            Severity::Critical
        } else if loss >= self.high_loss {
            Severity::High
        } else if loss >= self.medium_loss {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Outcome of a single scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub shock_type: String,
    pub probability: f64,
    pub portfolio_return: f64,
    pub portfolio_volatility: f64,
    pub value_at_risk: f64,
    pub drawdown: f64,
    pub severity: Severity,
    pub recovery_time: u32,
}

/// Aggregated stress test report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestReport {
    pub baseline: RiskMetrics,
    pub scenario_results: Vec<ScenarioResult>,
    /// Most negative scenario return (0 with no scenarios).
    pub worst_case_loss: f64,
    pub worst_case_scenario: Option<String>,
    /// Sum of probability x scenario return.
    pub probability_weighted_loss: f64,
    pub stress_test_passed: bool,
    /// Non-empty exactly when the test failed.
    pub recommended_actions: Vec<String>,
}

impl StressTestReport {
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.scenario_results
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }
}

/// Stress tester.
#[derive(Debug, Clone, Default)]
pub struct StressTester {
    config: StressConfig,
    metrics: MetricsCalculator,
}

impl StressTester {
    pub fn new(config: StressConfig, metrics: MetricsCalculator) -> Self {
        Self { config, metrics }
    }

    /// Run all scenarios against a portfolio.
    ///
    /// # Arguments
    /// * `weights` - Portfolio weights
    /// * `scenarios` - Shock scenarios to apply
    /// * `returns` - Historical returns for the baseline metrics
    /// * `limits` - Supplies the pass/fail `stress_test_threshold`
    pub fn run(
        &self,
        weights: &PortfolioWeights,
        scenarios: &[StressTestScenario],
        returns: &ReturnSeries,
        limits: &RiskLimits,
    ) -> StressTestReport {
        let baseline = self.metrics.calculate(weights, returns, None, 0.0);

        let scenario_results: Vec<ScenarioResult> = scenarios
            .par_iter()
            .map(|scenario| self.apply(&baseline, scenario))
            .collect();

        let worst = scenario_results.iter().min_by(|a, b| {
            a.portfolio_return
                .partial_cmp(&b.portfolio_return)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let worst_case_loss = worst.map(|r| r.portfolio_return.min(0.0)).unwrap_or(0.0);
        let worst_case_scenario = worst.map(|r| r.scenario_name.clone());

        let probability_weighted_loss: f64 = scenario_results
            .iter()
            .map(|r| r.probability * r.portfolio_return)
            .sum();

        let stress_test_passed = worst_case_loss.abs() <= limits.stress_test_threshold;
        let recommended_actions = if stress_test_passed {
            Vec::new()
        } else {
            Self::recommend(&scenario_results, worst, limits)
        };

        if !stress_test_passed {
            warn!(
                worst_case_loss,
                threshold = limits.stress_test_threshold,
                scenario = worst_case_scenario.as_deref().unwrap_or(""),
                severity = worst.map(|r| r.severity.as_str()).unwrap_or(""),
                "Stress test failed"
            );
        }
        debug!(
            scenarios = scenario_results.len(),
            probability_weighted_loss,
            "Completed stress test"
        );

        StressTestReport {
            baseline,
            scenario_results,
            worst_case_loss,
            worst_case_scenario,
            probability_weighted_loss,
            stress_test_passed,
            recommended_actions,
        }
    }

    /// Apply one scenario's deltas to the baseline.
    pub fn apply(&self, baseline: &RiskMetrics, scenario: &StressTestScenario) -> ScenarioResult {
        let impact = &scenario.impact;
        let portfolio_return = impact.portfolio_return;

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            shock_type: scenario.shock_type.clone(),
            probability: scenario.probability,
            portfolio_return,
            portfolio_volatility: (baseline.volatility + impact.portfolio_volatility).max(0.0),
            value_at_risk: (baseline.value_at_risk + impact.value_at_risk).max(0.0),
            drawdown: (baseline.maximum_drawdown + impact.drawdown).clamp(0.0, MAX_DRAWDOWN),
            severity: self.config.classify(portfolio_return),
            recovery_time: scenario.recovery_time,
        }
    }

    fn recommend(
        results: &[ScenarioResult],
        worst: Option<&ScenarioResult>,
        limits: &RiskLimits,
    ) -> Vec<String> {
        let mut actions = Vec::new();

        if let Some(worst) = worst {
            actions.push(format!(
                "Reduce concentration in positions most exposed to '{}' \
                 ({} severity, {:.1}% loss vs {:.1}% tolerance)",
                worst.scenario_name,
                worst.severity.as_str(),
                -worst.portfolio_return * 100.0,
                limits.stress_test_threshold * 100.0
            ));
            actions.push(format!(
                "Increase hedges against {} shocks",
                worst.shock_type.replace('_', " ")
            ));
        }

        let critical = results
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();
        if critical > 0 {
            actions.push(format!(
                "Raise the cash buffer: {} scenario(s) produce critical losses",
                critical
            ));
        }

        if actions.is_empty() {
            actions.push("Reduce overall portfolio exposure".to_string());
        }

        actions
    }

    /// Standard historical scenarios for callers without authored ones.
    pub fn historical_scenarios() -> Vec<StressTestScenario> {
        vec![
            StressTestScenario {
                name: "2008 Financial Crisis".to_string(),
                description: "Global credit crisis and equity bear market".to_string(),
                shock_type: "market_crash".to_string(),
                shock_parameters: BTreeMap::from([
                    ("equity_shock".to_string(), -0.50),
                    ("credit_spread_bps".to_string(), 600.0),
                ]),
                probability: 0.02,
                impact: ScenarioImpact {
                    portfolio_return: -0.35,
                    portfolio_volatility: 0.25,
                    value_at_risk: 0.04,
                    drawdown: 0.35,
                },
                recovery_time: 1_000,
            },
            StressTestScenario {
                name: "2020 COVID Crash".to_string(),
                description: "Pandemic liquidity shock".to_string(),
                shock_type: "market_crash".to_string(),
                shock_parameters: BTreeMap::from([
                    ("equity_shock".to_string(), -0.34),
                    ("vix_level".to_string(), 82.0),
                ]),
                probability: 0.03,
                impact: ScenarioImpact {
                    portfolio_return: -0.30,
                    portfolio_volatility: 0.30,
                    value_at_risk: 0.05,
                    drawdown: 0.30,
                },
                recovery_time: 120,
            },
            StressTestScenario {
                name: "2022 Rate Shock".to_string(),
                description: "Rapid policy rate increases".to_string(),
                shock_type: "interest_rate".to_string(),
                shock_parameters: BTreeMap::from([("rate_shock_bps".to_string(), 300.0)]),
                probability: 0.05,
                impact: ScenarioImpact {
                    portfolio_return: -0.18,
                    portfolio_volatility: 0.08,
                    value_at_risk: 0.015,
                    drawdown: 0.20,
                },
                recovery_time: 400,
            },
            StressTestScenario {
                name: "Flash Crash".to_string(),
                description: "Intraday liquidity evaporation".to_string(),
                shock_type: "liquidity".to_string(),
                shock_parameters: BTreeMap::from([("bid_ask_multiplier".to_string(), 10.0)]),
                probability: 0.10,
                impact: ScenarioImpact {
                    portfolio_return: -0.08,
                    portfolio_volatility: 0.15,
                    value_at_risk: 0.03,
                    drawdown: 0.08,
                },
                recovery_time: 5,
            },
        ]
    }
}
