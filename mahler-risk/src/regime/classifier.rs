//! Market regime classifier.
//!
//! Uses realized volatility and recent drawdown of the portfolio return
//! stream to classify market conditions for dynamic limit adjustment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::stats;

/// Regime level. Ordered by severity: `Low < Normal < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    /// Description of the regime.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Calm market, limits may be relaxed",
            Self::Normal => "Normal market conditions",
            Self::High => "Stressed market, limits should be tightened",
        }
    }
}

impl Default for VolatilityRegime {
    fn default() -> Self {
        Self::Normal
    }
}

/// Market conditions driving dynamic limit adjustment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub volatility_regime: VolatilityRegime,
    pub market_stress: VolatilityRegime,
}

impl MarketConditions {
    pub fn new(volatility_regime: VolatilityRegime, market_stress: VolatilityRegime) -> Self {
        Self {
            volatility_regime,
            market_stress,
        }
    }

    /// The more severe of the two regimes.
    pub fn dominant(&self) -> VolatilityRegime {
        self.volatility_regime.max(self.market_stress)
    }
}

/// Statistics for a regime.
#[derive(Debug, Clone)]
pub struct RegimeStats {
    pub regime: VolatilityRegime,
    pub periods: usize,
    pub pct_of_total: f64,
}

/// Regime classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeClassifierConfig {
    /// Periods of history used for realized volatility and drawdown.
    pub lookback: usize,
    /// Annualized volatility below which the regime is low.
    pub low_volatility: f64,
    /// Annualized volatility above which the regime is high.
    pub high_volatility: f64,
    /// Drawdown below which market stress is low.
    pub low_stress_drawdown: f64,
    /// Drawdown above which market stress is high.
    pub high_stress_drawdown: f64,
    /// Periods per year for annualizing volatility.
    pub annualization_factor: f64,
}

impl Default for RegimeClassifierConfig {
    fn default() -> Self {
        Self {
            lookback: 20, // ~1 month of daily returns
            low_volatility: 0.12,
            high_volatility: 0.25,
            low_stress_drawdown: 0.03,
            high_stress_drawdown: 0.10,
            annualization_factor: 252.0,
        }
    }
}

/// Streaming market regime classifier.
///
/// Owned by a single caller; it does not share state with the engine.
pub struct RegimeClassifier {
    config: RegimeClassifierConfig,
    history: Vec<f64>,
    regime_history: Vec<MarketConditions>,
}

impl RegimeClassifier {
    /// Create a new classifier.
    pub fn new(config: RegimeClassifierConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
            regime_history: Vec::new(),
        }
    }

    /// Record one portfolio return and classify current conditions.
    pub fn observe(&mut self, portfolio_return: f64) -> MarketConditions {
        self.history.push(portfolio_return);

        let conditions = self.classify(&self.history);

        if self.regime_history.last() != Some(&conditions) {
            info!(
                volatility_regime = conditions.volatility_regime.as_str(),
                market_stress = conditions.market_stress.as_str(),
                "Market regime changed: {}",
                conditions.volatility_regime.description()
            );
        }
        self.regime_history.push(conditions);

        conditions
    }

    /// Classify conditions from the trailing window of `returns`.
    ///
    /// Fewer than two observations cannot be classified and report normal.
    pub fn classify(&self, returns: &[f64]) -> MarketConditions {
        let start = returns.len().saturating_sub(self.config.lookback.max(2));
        let window = &returns[start..];

        if window.len() < 2 {
            return MarketConditions::default();
        }

        let realized = stats::std_dev(window) * self.config.annualization_factor.max(0.0).sqrt();
        let volatility_regime = if realized > self.config.high_volatility {
            VolatilityRegime::High
        } else if realized < self.config.low_volatility {
            VolatilityRegime::Low
        } else {
            VolatilityRegime::Normal
        };

        let drawdown = stats::max_drawdown(window);
        let market_stress = if drawdown > self.config.high_stress_drawdown {
            VolatilityRegime::High
        } else if drawdown < self.config.low_stress_drawdown {
            VolatilityRegime::Low
        } else {
            VolatilityRegime::Normal
        };

        MarketConditions {
            volatility_regime,
            market_stress,
        }
    }

    /// Get statistics of the dominant regime over the observed history.
    pub fn get_stats(&self) -> HashMap<VolatilityRegime, RegimeStats> {
        let mut stats: HashMap<VolatilityRegime, RegimeStats> = HashMap::new();
        let total = self.regime_history.len();

        for conditions in &self.regime_history {
            let regime = conditions.dominant();
            let entry = stats.entry(regime).or_insert_with(|| RegimeStats {
                regime,
                periods: 0,
                pct_of_total: 0.0,
            });
            entry.periods += 1;
        }

        for entry in stats.values_mut() {
            entry.pct_of_total = entry.periods as f64 / total as f64 * 100.0;
        }

        stats
    }

    /// Get current conditions.
    pub fn current_conditions(&self) -> MarketConditions {
        self.regime_history.last().copied().unwrap_or_default()
    }

    /// Get the classified history.
    pub fn regime_history(&self) -> &[MarketConditions] {
        &self.regime_history
    }

    /// Clear history.
    pub fn clear(&mut self) {
        self.history.clear();
        self.regime_history.clear();
    }

    /// Analyze a full return series.
    pub fn analyze(&mut self, returns: &[f64]) -> HashMap<VolatilityRegime, RegimeStats> {
        self.clear();

        for r in returns {
            self.observe(*r);
        }

        self.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::normal_returns;

    #[test]
    fn test_severity_order() {
        assert!(VolatilityRegime::High > VolatilityRegime::Normal);
        assert!(VolatilityRegime::Normal > VolatilityRegime::Low);

        let conditions = MarketConditions::new(VolatilityRegime::Low, VolatilityRegime::High);
        assert_eq!(conditions.dominant(), VolatilityRegime::High);
        assert!(conditions.dominant().description().contains("tightened"));
    }

    #[test]
    fn test_insufficient_history_is_normal() {
        let mut classifier = RegimeClassifier::new(RegimeClassifierConfig::default());
        let conditions = classifier.observe(-0.05);
        assert_eq!(conditions, MarketConditions::default());
    }

    #[test]
    fn test_calm_market() {
        let mut classifier = RegimeClassifier::new(RegimeClassifierConfig::default());
        // ~3% annualized volatility, small positive drift
        for r in normal_returns(30, 0.0005, 0.002, 4) {
            classifier.observe(r);
        }

        let conditions = classifier.current_conditions();
        assert_eq!(conditions.volatility_regime, VolatilityRegime::Low);
        assert_eq!(conditions.market_stress, VolatilityRegime::Low);
    }

    #[test]
    fn test_stressed_market() {
        let mut classifier = RegimeClassifier::new(RegimeClassifierConfig::default());
        // Alternating large losses: high volatility and a deep drawdown
        let returns: Vec<f64> = (0..25)
            .map(|i| if i % 2 == 0 { -0.04 } else { 0.01 })
            .collect();
        for r in returns {
            classifier.observe(r);
        }

        let conditions = classifier.current_conditions();
        assert_eq!(conditions.volatility_regime, VolatilityRegime::High);
        assert_eq!(conditions.market_stress, VolatilityRegime::High);
    }

    #[test]
    fn test_stats_calculation() {
        let mut classifier = RegimeClassifier::new(RegimeClassifierConfig::default());
        let mut returns = normal_returns(30, 0.0005, 0.002, 8);
        returns.extend((0..30).map(|i| if i % 2 == 0 { -0.05 } else { 0.02 }));

        let stats = classifier.analyze(&returns);
        assert!(stats.contains_key(&VolatilityRegime::High));
        let total: usize = stats.values().map(|s| s.periods).sum();
        assert_eq!(total, 60);
    }
}
