//! Portfolio risk metrics calculator.
//!
//! Combines portfolio weights and per-asset return series into a
//! `RiskMetrics` snapshot.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{PortfolioWeights, ReturnSeries};
use crate::stats::{self, BenchmarkRegression};
use crate::var::VarEngine;

/// Metrics calculator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Periods per year used to annualize volatility, Sharpe, Sortino,
    /// alpha, tracking error and information ratio. 1.0 keeps per-period
    /// figures.
    pub annualization_factor: f64,
    /// Confidence level of the embedded historical VaR/ES.
    pub var_confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            annualization_factor: 252.0,
            var_confidence: 0.95,
        }
    }
}

/// Risk snapshot for one portfolio over one return window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    // Tail risk (per period)
    pub value_at_risk: f64,
    pub expected_shortfall: f64,

    // Dispersion (annualized)
    pub volatility: f64,

    // Risk-adjusted returns (annualized)
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    pub maximum_drawdown: f64,

    // Benchmark-relative
    pub beta: f64,
    pub alpha: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,

    /// Weighted average asset volatility over portfolio volatility.
    pub diversification_ratio: f64,
    /// Number of portfolio return periods used.
    pub observations: usize,
}

impl RiskMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Risk Summary\n\
             ============\n\
             \n\
             VaR: {:.2}%\n\
             Expected Shortfall: {:.2}%\n\
             Volatility: {:.2}%\n\
             Max Drawdown: {:.2}%\n\
             \n\
             Sharpe Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             \n\
             Beta: {:.2}\n\
             Alpha: {:.2}%\n\
             Tracking Error: {:.2}%\n\
             Information Ratio: {:.2}\n\
             Diversification Ratio: {:.2}\n\
             Observations: {}",
            self.value_at_risk * 100.0,
            self.expected_shortfall * 100.0,
            self.volatility * 100.0,
            self.maximum_drawdown * 100.0,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.beta,
            self.alpha * 100.0,
            self.tracking_error * 100.0,
            self.information_ratio,
            self.diversification_ratio,
            self.observations
        )
    }
}

/// Metrics calculator.
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Calculate risk metrics for a weighted portfolio.
    ///
    /// # Arguments
    /// * `weights` - Portfolio weights by symbol
    /// * `returns` - Per-asset return series (oldest first)
    /// * `benchmark` - Optional benchmark return series
    /// * `risk_free_rate` - Per-period risk-free rate
    pub fn calculate(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
        benchmark: Option<&[f64]>,
        risk_free_rate: f64,
    ) -> RiskMetrics {
        let portfolio = Self::portfolio_returns(weights, returns);
        if portfolio.is_empty() {
            warn!(
                assets = weights.len(),
                series = returns.len(),
                "No portfolio returns available, reporting zero metrics"
            );
            return RiskMetrics::default();
        }

        let annualize = self.config.annualization_factor.max(0.0);
        let sqrt_annualize = annualize.sqrt();

        let period_vol = stats::std_dev(&portfolio);
        let tail = VarEngine::historical(&portfolio, self.config.var_confidence);

        let regression = match benchmark {
            Some(bench) if !bench.is_empty() => stats::regress(&portfolio, bench, risk_free_rate),
            _ => BenchmarkRegression::default(),
        };

        let metrics = RiskMetrics {
            value_at_risk: tail.value_at_risk,
            expected_shortfall: tail.expected_shortfall,
            volatility: period_vol * sqrt_annualize,
            sharpe_ratio: stats::sharpe_ratio(&portfolio, risk_free_rate) * sqrt_annualize,
            sortino_ratio: stats::sortino_ratio(&portfolio, risk_free_rate) * sqrt_annualize,
            maximum_drawdown: stats::max_drawdown(&portfolio),
            beta: regression.beta,
            alpha: regression.alpha * annualize,
            tracking_error: regression.tracking_error * sqrt_annualize,
            information_ratio: regression.information_ratio * sqrt_annualize,
            diversification_ratio: Self::diversification_ratio(weights, returns, period_vol),
            observations: portfolio.len(),
        };

        debug!(
            observations = metrics.observations,
            volatility = metrics.volatility,
            var = metrics.value_at_risk,
            drawdown = metrics.maximum_drawdown,
            "Calculated risk metrics"
        );

        metrics
    }

    /// Weighted portfolio return per period.
    ///
    /// The series is as long as the longest weighted asset series; periods
    /// an asset has no data for contribute zero.
    pub fn portfolio_returns(weights: &PortfolioWeights, returns: &ReturnSeries) -> Vec<f64> {
        let periods = weights
            .keys()
            .filter_map(|symbol| returns.get(symbol))
            .map(Vec::len)
            .max()
            .unwrap_or(0);

        let mut portfolio = vec![0.0; periods];
        for (symbol, weight) in weights {
            if let Some(series) = returns.get(symbol) {
                for (total, r) in portfolio.iter_mut().zip(series) {
                    *total += weight * r;
                }
            }
        }

        portfolio
    }

    /// Sum of weighted asset volatilities over portfolio volatility (per
    /// period). 1.0 when the portfolio has no measurable variance.
    fn diversification_ratio(
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
        portfolio_vol: f64,
    ) -> f64 {
        if portfolio_vol <= 0.0 {
            return 1.0;
        }

        let weighted: f64 = weights
            .iter()
            .map(|(symbol, w)| {
                let vol = returns.get(symbol).map(|s| stats::std_dev(s)).unwrap_or(0.0);
                w * vol
            })
            .sum();

        weighted / portfolio_vol
    }
}
