//! Risk engine facade.
//!
//! Wires the components together around one shared configuration. The
//! engine is an immutable value: adjusting limits for market conditions
//! returns a new engine, so an engine can be shared across threads without
//! locking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::budgeting::{RiskBudget, RiskBudgeter};
use crate::config::RiskEngineConfig;
use crate::data::{
    PortfolioContext, PortfolioSnapshot, PortfolioWeights, ReturnSeries, TradingSignal,
};
use crate::error::RiskResult;
use crate::limits::{LimitCheckResult, RiskLimits, RiskLimitsChecker};
use crate::metrics::{MetricsCalculator, RiskMetrics};
use crate::rebalance::{RebalanceGenerator, RebalancePlan};
use crate::regime::{MarketConditions, RegimeClassifier};
use crate::risk::{
    ApprovalDecision, ApprovalWorkflow, PositionSizeRecommendation, PositionSizer, SizingAlgorithm,
};
use crate::stats;
use crate::stress::{StressTestReport, StressTestScenario, StressTester};
use crate::var::{VaRCalculation, VarEngine, VarParams};

/// Full risk report for one portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub generated_at: DateTime<Utc>,
    pub market_conditions: MarketConditions,
    /// Limits after regime adjustment.
    pub active_limits: RiskLimits,
    pub metrics: RiskMetrics,
    pub value_at_risk: VaRCalculation,
    pub limit_check: LimitCheckResult,
    pub stress_test: Option<StressTestReport>,
}

/// Portfolio risk engine.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: Arc<RiskEngineConfig>,
    limits: Arc<RiskLimits>,
    metrics: MetricsCalculator,
    stress: StressTester,
    budgeter: RiskBudgeter,
    sizer: PositionSizer,
    approval: ApprovalWorkflow,
    rebalancer: RebalanceGenerator,
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::build(RiskEngineConfig::default())
    }
}

impl RiskEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: RiskEngineConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RiskEngineConfig) -> Self {
        let metrics = MetricsCalculator::new(config.metrics.clone());
        Self {
            limits: Arc::new(config.limits.clone()),
            stress: StressTester::new(config.stress.clone(), metrics.clone()),
            budgeter: RiskBudgeter::new(config.budgeting.clone()),
            sizer: PositionSizer::new(config.sizing.clone()),
            approval: ApprovalWorkflow::new(config.approval.clone()),
            rebalancer: RebalanceGenerator::new(config.rebalance.clone()),
            metrics,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }

    /// Limits currently in force.
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn calculate_risk_metrics(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
        benchmark: Option<&[f64]>,
        risk_free_rate: f64,
    ) -> RiskMetrics {
        self.metrics.calculate(weights, returns, benchmark, risk_free_rate)
    }

    /// VaR of a return series; `params` defaults to the configured parameters.
    pub fn calculate_var(
        &self,
        returns: &[f64],
        params: Option<&VarParams>,
    ) -> RiskResult<VaRCalculation> {
        VarEngine::calculate(returns, params.unwrap_or(&self.config.var))
    }

    /// VaR of the weighted portfolio return series.
    pub fn portfolio_var(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
        params: Option<&VarParams>,
    ) -> RiskResult<VaRCalculation> {
        let portfolio = MetricsCalculator::portfolio_returns(weights, returns);
        self.calculate_var(&portfolio, params)
    }

    /// Run scenarios against the portfolio, judged by the active stress threshold.
    pub fn run_stress_test(
        &self,
        weights: &PortfolioWeights,
        scenarios: &[StressTestScenario],
        returns: &ReturnSeries,
    ) -> StressTestReport {
        self.stress.run(weights, scenarios, returns, &self.limits)
    }

    pub fn calculate_risk_budget(
        &self,
        weights: &PortfolioWeights,
        covariance: &[Vec<f64>],
        total_risk_budget: f64,
    ) -> RiskResult<RiskBudget> {
        self.budgeter.allocate(weights, covariance, total_risk_budget)
    }

    /// Risk budget using the annualized covariance estimated from `returns`,
    /// so `total_risk_budget` is an annualized volatility.
    pub fn estimate_risk_budget(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
        total_risk_budget: f64,
    ) -> RiskResult<RiskBudget> {
        let covariance = self.annualized_covariance(weights, returns);
        self.budgeter.allocate(weights, &covariance, total_risk_budget)
    }

    /// Equal-risk-contribution target weights estimated from `returns`.
    pub fn risk_parity_targets(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
    ) -> RiskResult<PortfolioWeights> {
        let covariance = self.annualized_covariance(weights, returns);
        self.budgeter.risk_parity_weights(weights, &covariance)
    }

    /// Check metrics and weights against the active limits.
    pub fn check_risk_limits(
        &self,
        metrics: &RiskMetrics,
        weights: &PortfolioWeights,
    ) -> LimitCheckResult {
        RiskLimitsChecker::check(metrics, weights, &self.limits)
    }

    /// Classify market conditions from recent portfolio returns.
    pub fn classify_market(&self, portfolio_returns: &[f64]) -> MarketConditions {
        RegimeClassifier::new(self.config.regime.clone()).classify(portfolio_returns)
    }

    /// Engine whose active limits are the configured limits adjusted for
    /// `conditions`. Adjustments do not compound across calls.
    pub fn update_risk_limits(&self, conditions: &MarketConditions) -> RiskEngine {
        let limits = self.config.limits.adjusted_for(conditions);
        if limits != *self.limits {
            info!(
                regime = conditions.dominant().as_str(),
                max_portfolio_volatility = limits.max_portfolio_volatility,
                max_value_at_risk = limits.max_value_at_risk,
                "Active risk limits updated"
            );
        }
        RiskEngine {
            limits: Arc::new(limits),
            ..self.clone()
        }
    }

    /// Size a position with `algorithm`, or the configured default.
    pub fn size_position(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
        algorithm: Option<SizingAlgorithm>,
    ) -> PositionSizeRecommendation {
        match algorithm {
            Some(algorithm) => self.sizer.recommend_with(signal, context, algorithm),
            None => self.sizer.recommend(signal, context),
        }
    }

    pub fn review_position(&self, recommendation: &PositionSizeRecommendation) -> ApprovalDecision {
        self.approval.review(recommendation)
    }

    /// Review recommendations in parallel; decisions keep the input order.
    pub fn review_positions(
        &self,
        recommendations: &[PositionSizeRecommendation],
    ) -> Vec<ApprovalDecision> {
        self.approval.review_batch(recommendations)
    }

    pub fn generate_rebalance_plan(
        &self,
        current: &PortfolioWeights,
        targets: &PortfolioWeights,
        total_value: Decimal,
    ) -> RebalancePlan {
        self.rebalancer.generate(current, targets, total_value)
    }

    /// Metrics, VaR and limit compliance for a portfolio, with limits
    /// adjusted to the market conditions implied by its own returns.
    /// Scenarios, when given, are stress tested against the same limits.
    pub fn portfolio_report(
        &self,
        snapshot: &PortfolioSnapshot,
        scenarios: &[StressTestScenario],
    ) -> RiskResult<RiskReport> {
        let portfolio = MetricsCalculator::portfolio_returns(&snapshot.weights, &snapshot.returns);
        let market_conditions = self.classify_market(&portfolio);
        let engine = self.update_risk_limits(&market_conditions);

        let metrics = engine.calculate_risk_metrics(
            &snapshot.weights,
            &snapshot.returns,
            snapshot.benchmark.as_deref(),
            snapshot.risk_free_rate,
        );
        let value_at_risk = engine.calculate_var(&portfolio, None)?;
        let limit_check = engine.check_risk_limits(&metrics, &snapshot.weights);
        let stress_test = (!scenarios.is_empty())
            .then(|| engine.run_stress_test(&snapshot.weights, scenarios, &snapshot.returns));

        debug!(
            compliant = limit_check.compliant,
            regime = market_conditions.dominant().as_str(),
            "Built risk report"
        );

        Ok(RiskReport {
            generated_at: Utc::now(),
            market_conditions,
            active_limits: engine.limits().clone(),
            metrics,
            value_at_risk,
            limit_check,
            stress_test,
        })
    }

    fn annualized_covariance(
        &self,
        weights: &PortfolioWeights,
        returns: &ReturnSeries,
    ) -> Vec<Vec<f64>> {
        let symbols: Vec<String> = weights.keys().cloned().collect();
        let factor = self.config.metrics.annualization_factor;
        stats::covariance_matrix(returns, &symbols)
            .into_iter()
            .map(|row| row.into_iter().map(|c| c * factor).collect())
            .collect()
    }
}
