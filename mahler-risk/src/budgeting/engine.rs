//! Risk budget allocation from a covariance matrix.
//!
//! Each asset's share of portfolio variance is
//! `contribution_i = w_i * (Σw)_i / wᵀΣw`; the total risk budget is split in
//! proportion to these contributions. Covariance rows and columns follow the
//! sorted symbol order of the weights, and the total budget is expressed in
//! the same volatility units as the matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::PortfolioWeights;
use crate::error::{RiskError, RiskResult};

/// Risk budgeting configuration.
///
/// `max_risk_contribution` is a concentration policy, not a derived bound.
/// Any portfolio with fewer than `1 / max_risk_contribution` assets must
/// breach it, so the default of 0.40 flags every one- or two-asset portfolio
/// for rebalancing. Raise it for deliberately concentrated books.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetingConfig {
    /// Maximum share of portfolio variance any single asset may contribute.
    pub max_risk_contribution: f64,
    /// Iteration cap for the equal-risk-contribution solver.
    pub parity_iterations: usize,
    /// Convergence tolerance on risk contribution shares.
    pub parity_tolerance: f64,
}

impl Default for BudgetingConfig {
    fn default() -> Self {
        Self {
            max_risk_contribution: 0.40,
            parity_iterations: 1_000,
            parity_tolerance: 1e-10,
        }
    }
}

/// An asset whose risk contribution exceeds the allowed share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudgetBreach {
    pub symbol: String,
    pub current_contribution: f64,
    pub allowed_contribution: f64,
}

/// Risk budget allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBudget {
    pub total_risk_budget: f64,
    /// Budget per asset; sums to `total_risk_budget`.
    pub asset_risk_budgets: BTreeMap<String, f64>,
    /// Share of portfolio variance per asset; sums to 1.
    pub risk_contributions: BTreeMap<String, f64>,
    /// Portfolio volatility, sqrt(wᵀΣw).
    pub portfolio_risk: f64,
    /// Portfolio risk over total budget; above 1 is over budget.
    pub risk_budget_utilization: f64,
    pub rebalancing_required: bool,
    pub risk_limit_breaches: Vec<RiskBudgetBreach>,
}

/// Risk budgeter.
#[derive(Debug, Clone, Default)]
pub struct RiskBudgeter {
    config: BudgetingConfig,
}

impl RiskBudgeter {
    pub fn new(config: BudgetingConfig) -> Self {
        Self { config }
    }

    /// Allocate `total_risk_budget` across the portfolio's assets.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the budget is not positive or the
    /// covariance matrix is not n x n for n weighted assets.
    pub fn allocate(
        &self,
        weights: &PortfolioWeights,
        covariance: &[Vec<f64>],
        total_risk_budget: f64,
    ) -> RiskResult<RiskBudget> {
        if !(total_risk_budget.is_finite() && total_risk_budget > 0.0) {
            return Err(RiskError::invalid(format!(
                "total risk budget must be positive, got {}",
                total_risk_budget
            )));
        }
        validate_covariance(weights.len(), covariance)?;

        let symbols: Vec<&String> = weights.keys().collect();
        let w: Vec<f64> = weights.values().copied().collect();

        let sigma_w = mat_vec(covariance, &w);
        let variance: f64 = w.iter().zip(&sigma_w).map(|(a, b)| a * b).sum();
        let contributions = Self::contributions(&w, &sigma_w, variance);

        let contribution_sum: f64 = contributions.iter().sum();
        let mut asset_risk_budgets = BTreeMap::new();
        let mut risk_contributions = BTreeMap::new();
        for (symbol, c) in symbols.iter().zip(&contributions) {
            let share = if contribution_sum != 0.0 { c / contribution_sum } else { 0.0 };
            asset_risk_budgets.insert((*symbol).clone(), share * total_risk_budget);
            risk_contributions.insert((*symbol).clone(), *c);
        }

        let portfolio_risk = variance.max(0.0).sqrt();
        let risk_budget_utilization = portfolio_risk / total_risk_budget;

        let risk_limit_breaches: Vec<RiskBudgetBreach> = risk_contributions
            .iter()
            .filter(|(_, c)| **c > self.config.max_risk_contribution)
            .map(|(symbol, c)| RiskBudgetBreach {
                symbol: symbol.clone(),
                current_contribution: *c,
                allowed_contribution: self.config.max_risk_contribution,
            })
            .collect();

        let rebalancing_required =
            risk_budget_utilization > 1.0 || !risk_limit_breaches.is_empty();

        debug!(
            assets = symbols.len(),
            portfolio_risk,
            utilization = risk_budget_utilization,
            breaches = risk_limit_breaches.len(),
            "Allocated risk budget"
        );

        Ok(RiskBudget {
            total_risk_budget,
            asset_risk_budgets,
            risk_contributions,
            portfolio_risk,
            risk_budget_utilization,
            rebalancing_required,
            risk_limit_breaches,
        })
    }

    /// Equal-risk-contribution weights with the same invested fraction as
    /// `weights`.
    ///
    /// Assets with no variance carry no risk to balance and receive zero
    /// weight, unless no asset has variance, in which case weights are equal.
    pub fn risk_parity_weights(
        &self,
        weights: &PortfolioWeights,
        covariance: &[Vec<f64>],
    ) -> RiskResult<PortfolioWeights> {
        validate_covariance(weights.len(), covariance)?;
        let n = weights.len();
        if n == 0 {
            return Ok(PortfolioWeights::new());
        }

        let invested: f64 = weights.values().sum();
        let invested = if invested > 0.0 { invested } else { 1.0 };

        let risky: Vec<bool> = (0..n).map(|i| covariance[i][i] > 0.0).collect();
        let risky_count = risky.iter().filter(|r| **r).count();
        if risky_count == 0 {
            return Ok(weights
                .keys()
                .map(|s| (s.clone(), invested / n as f64))
                .collect());
        }

        // Inverse-volatility start; exact for uncorrelated assets.
        let mut x: Vec<f64> = (0..n)
            .map(|i| if risky[i] { 1.0 / covariance[i][i].sqrt() } else { 0.0 })
            .collect();
        normalize(&mut x);

        let target = 1.0 / risky_count as f64;
        for iteration in 0..self.config.parity_iterations {
            let sigma_x = mat_vec(covariance, &x);
            let variance: f64 = x.iter().zip(&sigma_x).map(|(a, b)| a * b).sum();
            if variance <= 0.0 {
                break;
            }

            let mut max_gap = 0.0_f64;
            for i in 0..n {
                if !risky[i] {
                    continue;
                }
                let share = x[i] * sigma_x[i] / variance;
                max_gap = max_gap.max((share - target).abs());
                if share > 0.0 {
                    x[i] *= (target / share).sqrt();
                }
            }
            normalize(&mut x);

            if max_gap < self.config.parity_tolerance {
                debug!(iterations = iteration + 1, "Risk parity converged");
                break;
            }
        }

        Ok(weights
            .keys()
            .zip(x)
            .map(|(s, xi)| (s.clone(), xi * invested))
            .collect())
    }

    fn contributions(w: &[f64], sigma_w: &[f64], variance: f64) -> Vec<f64> {
        if variance > 0.0 {
            return w.iter().zip(sigma_w).map(|(a, b)| a * b / variance).collect();
        }

        warn!("Portfolio has no variance, attributing risk by weight");
        let total: f64 = w.iter().sum();
        if total > 0.0 {
            w.iter().map(|a| a / total).collect()
        } else {
            vec![1.0 / w.len().max(1) as f64; w.len()]
        }
    }
}

fn validate_covariance(n: usize, covariance: &[Vec<f64>]) -> RiskResult<()> {
    if covariance.len() != n {
        return Err(RiskError::invalid(format!(
            "covariance matrix has {} rows for {} weighted assets",
            covariance.len(),
            n
        )));
    }
    if let Some((i, row)) = covariance.iter().enumerate().find(|(_, row)| row.len() != n) {
        return Err(RiskError::invalid(format!(
            "covariance row {} has {} columns, expected {}",
            i,
            row.len(),
            n
        )));
    }
    Ok(())
}

fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn normalize(x: &mut [f64]) {
    let total: f64 = x.iter().sum();
    if total > 0.0 {
        x.iter_mut().for_each(|v| *v /= total);
    }
}
