//! Risk engine configuration.
//!
//! One section per component; every section is optional in TOML and falls
//! back to its defaults.
//!
//! ```toml
//! [limits]
//! max_portfolio_volatility = 0.18
//!
//! [var]
//! confidence_level = 0.99
//!
//! [var.method]
//! type = "monte_carlo"
//! simulations = 20000
//! seed = 7
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budgeting::BudgetingConfig;
use crate::error::{RiskError, RiskResult};
use crate::limits::RiskLimits;
use crate::metrics::MetricsConfig;
use crate::rebalance::RebalanceConfig;
use crate::regime::RegimeClassifierConfig;
use crate::risk::{ApprovalThresholds, SizingConfig};
use crate::stress::StressConfig;
use crate::var::VarParams;

/// Configuration for every risk engine component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskEngineConfig {
    pub limits: RiskLimits,
    pub metrics: MetricsConfig,
    /// Default VaR parameters.
    pub var: VarParams,
    pub stress: StressConfig,
    pub budgeting: BudgetingConfig,
    pub sizing: SizingConfig,
    pub approval: ApprovalThresholds,
    pub rebalance: RebalanceConfig,
    pub regime: RegimeClassifierConfig,
}

impl RiskEngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> RiskResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> RiskResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded risk engine config");
        Ok(config)
    }

    /// Reject structurally invalid values.
    pub fn validate(&self) -> RiskResult<()> {
        self.limits.validate()?;
        self.var.validate()?;
        self.stress.validate()?;
        self.sizing.validate()?;
        self.approval.validate()?;
        self.rebalance.validate()?;

        if !(self.metrics.annualization_factor > 0.0) {
            return Err(RiskError::invalid("metrics.annualization_factor must be positive"));
        }
        if !(self.metrics.var_confidence > 0.0 && self.metrics.var_confidence < 1.0) {
            return Err(RiskError::invalid(format!(
                "metrics.var_confidence must be in (0, 1), got {}",
                self.metrics.var_confidence
            )));
        }
        // A critical scenario must also fail the stress limit
        if self.stress.critical_loss < self.limits.stress_test_threshold {
            return Err(RiskError::invalid(format!(
                "stress.critical_loss ({}) must not be below limits.stress_test_threshold ({})",
                self.stress.critical_loss, self.limits.stress_test_threshold
            )));
        }
        if self.budgeting.max_risk_contribution <= 0.0 {
            return Err(RiskError::invalid("budgeting.max_risk_contribution must be positive"));
        }
        if self.regime.low_volatility > self.regime.high_volatility
            || self.regime.low_stress_drawdown > self.regime.high_stress_drawdown
        {
            return Err(RiskError::invalid("regime low thresholds must not exceed high thresholds"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::SizingAlgorithm;
    use crate::var::VarMethod;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RiskEngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.limits.max_portfolio_volatility, 0.20);
        assert_eq!(config.var.method, VarMethod::Historical);
        assert_eq!(config.metrics.annualization_factor, 252.0);
        assert_eq!(config.sizing.algorithm, SizingAlgorithm::ConfidenceBased);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [limits]
            max_portfolio_volatility = 0.15
            dynamic_limits = false

            [limits.market_regime_adjustments.high]
            volatility = 0.5
            value_at_risk = 0.6
            concentration = 0.7

            [var]
            confidence_level = 0.99
            time_horizon = 10

            [var.method]
            type = "monte_carlo"
            simulations = 5000
            seed = 7

            [sizing]
            algorithm = "kelly"

            [stress]
            critical_loss = 0.25
        "#;
        let config = RiskEngineConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.limits.max_portfolio_volatility, 0.15);
        assert_eq!(config.limits.max_value_at_risk, 0.05);
        assert!(!config.limits.dynamic_limits);
        assert_eq!(config.limits.market_regime_adjustments.high.volatility, 0.5);
        assert_eq!(config.limits.market_regime_adjustments.low.volatility, 1.25);
        assert_eq!(
            config.var.method,
            VarMethod::MonteCarlo {
                simulations: 5000,
                seed: 7
            }
        );
        assert_eq!(config.var.time_horizon, 10);
        assert_eq!(config.sizing.algorithm, SizingAlgorithm::Kelly);
        assert_eq!(config.stress.critical_loss, 0.25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RiskEngineConfig::from_toml_str("[var]\nconfidence_level = 1.5\n");
        assert!(matches!(err, Err(RiskError::InvalidConfiguration(_))));

        let err = RiskEngineConfig::from_toml_str("[var]\ntime_horizon = 0\n");
        assert!(matches!(err, Err(RiskError::InvalidConfiguration(_))));

        let err = RiskEngineConfig::from_toml_str("[limits]\nmax_portfolio_volatility = -0.1\n");
        assert!(matches!(err, Err(RiskError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_critical_severity_below_stress_limit_rejected() {
        let toml = r#"
            [limits]
            stress_test_threshold = 0.25

            [stress]
            critical_loss = 0.20
        "#;
        let err = RiskEngineConfig::from_toml_str(toml);
        assert!(matches!(err, Err(RiskError::InvalidConfiguration(_))));

        let toml = r#"
            [limits]
            stress_test_threshold = 0.20
        "#;
        assert!(RiskEngineConfig::from_toml_str(toml).is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        let err = RiskEngineConfig::from_toml_str("[limits\n");
        assert!(matches!(err, Err(RiskError::ConfigParse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = RiskEngineConfig::from_file("/nonexistent/mahler-risk.toml");
        assert!(matches!(err, Err(RiskError::ConfigRead(_))));
    }
}
