//! Value-at-Risk and Expected Shortfall.
//!
//! Three estimation methods:
//! - Historical: empirical percentile of observed returns
//! - Parametric: normal distribution fitted to the returns
//! - Monte Carlo: seeded draws from the fitted normal, then historical
//!
//! Losses are reported as non-negative magnitudes. One-period estimates are
//! scaled to the horizon by the square-root-of-time rule.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::stats::{mean, percentile_sorted, std_dev};

/// Default Monte Carlo simulation count.
pub const DEFAULT_SIMULATIONS: usize = 10_000;

/// Default Monte Carlo seed.
pub const DEFAULT_SEED: u64 = 42;

/// VaR estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VarMethod {
    Historical,
    Parametric,
    MonteCarlo {
        /// Number of simulated periods. Bounds the computation cost.
        simulations: usize,
        /// RNG seed; identical inputs and seed give identical results.
        seed: u64,
    },
}

impl VarMethod {
    pub fn monte_carlo(simulations: usize) -> Self {
        Self::MonteCarlo {
            simulations,
            seed: DEFAULT_SEED,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::Parametric => "parametric",
            Self::MonteCarlo { .. } => "monte_carlo",
        }
    }
}

/// Parameters of a VaR calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarParams {
    pub method: VarMethod,
    /// Confidence level in (0, 1), e.g. 0.95.
    pub confidence_level: f64,
    /// Horizon in periods (>= 1).
    pub time_horizon: u32,
}

impl Default for VarParams {
    fn default() -> Self {
        Self {
            method: VarMethod::Historical,
            confidence_level: 0.95,
            time_horizon: 1,
        }
    }
}

impl VarParams {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(RiskError::invalid(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.time_horizon == 0 {
            return Err(RiskError::invalid("time horizon must be at least 1 period"));
        }
        if let VarMethod::MonteCarlo { simulations, .. } = self.method {
            if simulations == 0 {
                return Err(RiskError::invalid("monte carlo simulation count must be positive"));
            }
        }
        Ok(())
    }
}

/// Method-specific parameters recorded for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VarAssumptions {
    Historical {
        observations: usize,
        /// Return at the tail percentile (negative for a loss).
        threshold_return: f64,
    },
    Parametric {
        distribution: String,
        mean: f64,
        std_dev: f64,
        z_score: f64,
    },
    MonteCarlo {
        distribution: String,
        mean: f64,
        std_dev: f64,
        simulations: usize,
        seed: u64,
    },
}

/// Result of a VaR calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaRCalculation {
    pub method: VarMethod,
    pub confidence_level: f64,
    pub time_horizon: u32,
    /// Loss not exceeded with `confidence_level` probability over the horizon.
    pub value_at_risk: f64,
    /// Average loss beyond the VaR threshold. Always >= `value_at_risk`.
    pub expected_shortfall: f64,
    pub assumptions: VarAssumptions,
    pub calculation_timestamp: DateTime<Utc>,
}

/// One-period historical estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalEstimate {
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub threshold_return: f64,
}

/// VaR engine. Stateless; all methods are pure.
pub struct VarEngine;

impl VarEngine {
    /// Calculate VaR and ES for a portfolio return series.
    pub fn calculate(returns: &[f64], params: &VarParams) -> RiskResult<VaRCalculation> {
        params.validate()?;

        let (var_1, es_1, assumptions) = match params.method {
            VarMethod::Historical => {
                let est = Self::historical(returns, params.confidence_level);
                (
                    est.value_at_risk,
                    est.expected_shortfall,
                    VarAssumptions::Historical {
                        observations: returns.len(),
                        threshold_return: est.threshold_return,
                    },
                )
            }
            VarMethod::Parametric => Self::parametric(returns, params.confidence_level)?,
            VarMethod::MonteCarlo { simulations, seed } => {
                Self::monte_carlo(returns, params.confidence_level, simulations, seed)
            }
        };

        let scale = (params.time_horizon as f64).sqrt();

        debug!(
            method = params.method.name(),
            confidence = params.confidence_level,
            horizon = params.time_horizon,
            observations = returns.len(),
            var = var_1 * scale,
            "Calculated value at risk"
        );

        Ok(VaRCalculation {
            method: params.method,
            confidence_level: params.confidence_level,
            time_horizon: params.time_horizon,
            value_at_risk: var_1 * scale,
            expected_shortfall: es_1 * scale,
            assumptions,
            calculation_timestamp: Utc::now(),
        })
    }

    /// One-period historical VaR/ES at `confidence_level`.
    ///
    /// Empty input and loss-free series both give zero.
    pub fn historical(returns: &[f64], confidence_level: f64) -> HistoricalEstimate {
        if returns.is_empty() {
            return HistoricalEstimate {
                value_at_risk: 0.0,
                expected_shortfall: 0.0,
                threshold_return: 0.0,
            };
        }

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let threshold = percentile_sorted(&sorted, 1.0 - confidence_level);
        let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= threshold).collect();
        // Interpolation keeps the threshold >= the minimum, so the tail is never empty.
        let tail_mean = if tail.is_empty() { threshold } else { mean(&tail) };

        HistoricalEstimate {
            value_at_risk: (-threshold).max(0.0),
            expected_shortfall: (-tail_mean).max(0.0),
            threshold_return: threshold,
        }
    }

    fn parametric(
        returns: &[f64],
        confidence_level: f64,
    ) -> RiskResult<(f64, f64, VarAssumptions)> {
        let mu = mean(returns);
        let sigma = std_dev(returns);

        let standard = Normal::new(0.0, 1.0).map_err(|e| RiskError::invalid(e.to_string()))?;
        let tail_prob = 1.0 - confidence_level;
        let z = standard.inverse_cdf(tail_prob);

        let var = if returns.is_empty() {
            0.0
        } else {
            (-(mu + z * sigma)).max(0.0)
        };
        let es = if returns.is_empty() {
            0.0
        } else {
            (-(mu - sigma * standard.pdf(z) / tail_prob)).max(0.0)
        };

        Ok((
            var,
            es,
            VarAssumptions::Parametric {
                distribution: "normal".to_string(),
                mean: mu,
                std_dev: sigma,
                z_score: z,
            },
        ))
    }

    fn monte_carlo(
        returns: &[f64],
        confidence_level: f64,
        simulations: usize,
        seed: u64,
    ) -> (f64, f64, VarAssumptions) {
        let mu = mean(returns);
        let sigma = std_dev(returns);
        let assumptions = VarAssumptions::MonteCarlo {
            distribution: "normal".to_string(),
            mean: mu,
            std_dev: sigma,
            simulations,
            seed,
        };

        if returns.is_empty() {
            return (0.0, 0.0, assumptions);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let simulated: Vec<f64> = match rand_distr::Normal::new(mu, sigma) {
            Ok(dist) if sigma > 0.0 => (0..simulations).map(|_| dist.sample(&mut rng)).collect(),
            _ => vec![mu; simulations],
        };

        let est = Self::historical(&simulated, confidence_level);
        (est.value_at_risk, est.expected_shortfall, assumptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::normal_returns;

    fn params(method: VarMethod, horizon: u32) -> VarParams {
        VarParams {
            method,
            confidence_level: 0.95,
            time_horizon: horizon,
        }
    }

    fn all_methods() -> [VarMethod; 3] {
        [
            VarMethod::Historical,
            VarMethod::Parametric,
            VarMethod::monte_carlo(20_000),
        ]
    }

    #[test]
    fn test_historical_known_values() {
        let returns: Vec<f64> = (0..10).map(|i| -0.05 + 0.01 * i as f64).collect();
        let est = VarEngine::historical(&returns, 0.90);
        assert!((est.value_at_risk - 0.041).abs() < 1e-9);
        assert!((est.expected_shortfall - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_expected_shortfall_dominates_var() {
        let returns = normal_returns(500, 0.0003, 0.015, 7);
        for method in all_methods() {
            let calc = VarEngine::calculate(&returns, &params(method, 1)).unwrap();
            assert!(calc.value_at_risk > 0.0, "{} VaR should be positive", method.name());
            assert!(
                calc.expected_shortfall.abs() >= calc.value_at_risk.abs(),
                "{}: ES {} < VaR {}",
                method.name(),
                calc.expected_shortfall,
                calc.value_at_risk
            );
        }
    }

    #[test]
    fn test_square_root_of_time_scaling() {
        let returns = normal_returns(500, 0.0003, 0.015, 11);
        for method in all_methods() {
            let one = VarEngine::calculate(&returns, &params(method, 1)).unwrap();
            let ten = VarEngine::calculate(&returns, &params(method, 10)).unwrap();
            let ratio = ten.value_at_risk / one.value_at_risk;
            assert!((ratio - 10.0_f64.sqrt()).abs() < 1e-9);
            assert!(ten.expected_shortfall >= ten.value_at_risk);
        }
    }

    #[test]
    fn test_scaling_matches_aggregated_returns() {
        // 10-period VaR of summed simulated returns vs sqrt(10) * 1-period VaR
        let daily = normal_returns(25_200, 0.0003, 0.015, 3);
        let ten_day: Vec<f64> = daily.chunks(10).map(|c| c.iter().sum()).collect();

        let one = VarEngine::calculate(&daily, &params(VarMethod::Historical, 1)).unwrap();
        let scaled = one.value_at_risk * 10.0_f64.sqrt();
        let direct = VarEngine::historical(&ten_day, 0.95).value_at_risk;

        assert!(
            (scaled - direct).abs() / direct < 0.20,
            "scaled {} vs direct {}",
            scaled,
            direct
        );
    }

    #[test]
    fn test_parametric_matches_normal_quantile() {
        let returns = normal_returns(1_000, 0.0, 0.02, 5);
        let calc = VarEngine::calculate(&returns, &params(VarMethod::Parametric, 1)).unwrap();

        let expected = -(mean(&returns) - 1.644_853_6 * std_dev(&returns));
        assert!((calc.value_at_risk - expected).abs() < 1e-6);
        match calc.assumptions {
            VarAssumptions::Parametric { ref distribution, z_score, .. } => {
                assert_eq!(distribution, "normal");
                assert!((z_score + 1.644_853_6).abs() < 1e-6);
            }
            ref other => panic!("unexpected assumptions: {:?}", other),
        }
    }

    #[test]
    fn test_monte_carlo_is_reproducible() {
        let returns = normal_returns(250, 0.0005, 0.01, 9);
        let p = params(VarMethod::MonteCarlo { simulations: 5_000, seed: 17 }, 1);

        let a = VarEngine::calculate(&returns, &p).unwrap();
        let b = VarEngine::calculate(&returns, &p).unwrap();
        assert_eq!(a.value_at_risk, b.value_at_risk);
        match a.assumptions {
            VarAssumptions::MonteCarlo { simulations, seed, .. } => {
                assert_eq!(simulations, 5_000);
                assert_eq!(seed, 17);
            }
            ref other => panic!("unexpected assumptions: {:?}", other),
        }
    }

    #[test]
    fn test_empty_returns_are_zero() {
        for method in all_methods() {
            let calc = VarEngine::calculate(&[], &params(method, 5)).unwrap();
            assert_eq!(calc.value_at_risk, 0.0);
            assert_eq!(calc.expected_shortfall, 0.0);
        }
    }

    #[test]
    fn test_gains_only_has_no_loss() {
        let returns = [0.01, 0.02, 0.015, 0.03];
        let calc = VarEngine::calculate(&returns, &params(VarMethod::Historical, 1)).unwrap();
        assert_eq!(calc.value_at_risk, 0.0);
        assert_eq!(calc.expected_shortfall, 0.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let returns = [0.01, -0.02];
        let bad_confidence = VarParams {
            confidence_level: 1.5,
            ..VarParams::default()
        };
        assert!(matches!(
            VarEngine::calculate(&returns, &bad_confidence),
            Err(RiskError::InvalidConfiguration(_))
        ));

        let negative_confidence = VarParams {
            confidence_level: -0.95,
            ..VarParams::default()
        };
        assert!(VarEngine::calculate(&returns, &negative_confidence).is_err());

        let zero_horizon = VarParams {
            time_horizon: 0,
            ..VarParams::default()
        };
        assert!(VarEngine::calculate(&returns, &zero_horizon).is_err());

        let no_sims = params(VarMethod::MonteCarlo { simulations: 0, seed: 1 }, 1);
        assert!(VarEngine::calculate(&returns, &no_sims).is_err());
    }

    #[test]
    fn test_method_serde_tag() {
        let json = serde_json::to_string(&VarMethod::monte_carlo(1_000)).unwrap();
        assert_eq!(json, r#"{"type":"monte_carlo","simulations":1000,"seed":42}"#);
        let parsed: VarMethod = serde_json::from_str(r#"{"type":"parametric"}"#).unwrap();
        assert_eq!(parsed, VarMethod::Parametric);
    }
}
