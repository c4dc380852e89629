//! Position sizing module.
//!
//! Turns a trading signal and the current portfolio into a sized position:
//! - Confidence-based: base allocation scaled by signal confidence
//! - Kelly: fractional Kelly from confidence and an assumed payoff ratio
//! - Risk parity: inverse-volatility share among held assets
//! - Volatility-adjusted: base allocation scaled by reference / asset volatility
//!
//! Every size is capped at `max_position_size`; buys are further capped by
//! available cash and sells by the current holding (no shorting).

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{PortfolioContext, RiskLevel, SignalDirection, TradingSignal};
use crate::error::{RiskError, RiskResult};
use crate::stats;

/// Position sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Algorithm used when none is requested explicitly.
    pub algorithm: SizingAlgorithm,
    /// Maximum position as a fraction of total portfolio value.
    pub max_position_size: f64,
    /// Allocation at full confidence / reference volatility.
    pub base_allocation: f64,
    /// Fraction of full Kelly to deploy.
    pub kelly_fraction: f64,
    /// Assumed win/loss payoff ratio for Kelly sizing.
    pub payoff_ratio: f64,
    /// Annualized volatility at which volatility-adjusted sizing uses the base allocation.
    pub reference_volatility: f64,
    /// Annualized volatility assumed when a symbol has no usable history.
    pub default_volatility: f64,
    /// Positions above this fraction require operator approval.
    pub approval_threshold: f64,
    /// Periods per year used to annualize volatility.
    pub annualization_factor: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            algorithm: SizingAlgorithm::ConfidenceBased,
            max_position_size: 0.20,
            base_allocation: 0.10,
            kelly_fraction: 0.25,
            payoff_ratio: 2.0,
            reference_volatility: 0.20,
            default_volatility: 0.25,
            approval_threshold: 0.10,
            annualization_factor: 252.0,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if !(self.max_position_size > 0.0 && self.max_position_size <= 1.0) {
            return Err(RiskError::invalid(format!(
                "max_position_size must be in (0, 1], got {}",
                self.max_position_size
            )));
        }
        if self.payoff_ratio <= 0.0 {
            return Err(RiskError::invalid("payoff_ratio must be positive"));
        }
        if self.reference_volatility <= 0.0 || self.default_volatility <= 0.0 {
            return Err(RiskError::invalid("volatility assumptions must be positive"));
        }
        if !(0.0..=1.0).contains(&self.kelly_fraction) {
            return Err(RiskError::invalid("kelly_fraction must be in [0, 1]"));
        }
        Ok(())
    }

    /// Annualized volatility of `symbol`, or `default_volatility` when its
    /// history is missing, too short or flat.
    pub fn symbol_volatility(&self, context: &PortfolioContext, symbol: &str) -> f64 {
        context
            .returns
            .get(symbol)
            .filter(|series| series.len() >= 2)
            .map(|series| stats::std_dev(series) * self.annualization_factor.max(0.0).sqrt())
            .filter(|vol| *vol > 0.0)
            .unwrap_or(self.default_volatility)
    }
}

/// Position sizing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingAlgorithm {
    ConfidenceBased,
    Kelly,
    RiskParity,
    VolatilityAdjusted,
}

impl SizingAlgorithm {
    pub const ALL: [SizingAlgorithm; 4] = [
        Self::ConfidenceBased,
        Self::Kelly,
        Self::RiskParity,
        Self::VolatilityAdjusted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfidenceBased => "confidence_based",
            Self::Kelly => "kelly",
            Self::RiskParity => "risk_parity",
            Self::VolatilityAdjusted => "volatility_adjusted",
        }
    }

    /// Size a position for `signal` against the current portfolio.
    pub fn compute_size(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
        config: &SizingConfig,
    ) -> PositionSize {
        let confidence = signal.confidence_fraction();

        if signal.direction == SignalDirection::Hold {
            return PositionSize::empty(*self, confidence, "Hold signal: no position change");
        }

        let (target, risk_adjustment, mut reasoning) =
            self.target_percentage(signal, context, config);

        let mut percentage = target.max(0.0);
        if percentage > config.max_position_size {
            percentage = config.max_position_size;
            reasoning.push_str(&format!(
                " (capped at max position {:.1}%)",
                config.max_position_size * 100.0
            ));
        }

        if context.total_value <= Decimal::ZERO {
            return PositionSize::empty(*self, confidence, "Portfolio has no value to allocate");
        }

        // Truncate to cents so rounding never lifts the size above the cap
        let mut dollar_amount = (Decimal::from_f64(percentage).unwrap_or(Decimal::ZERO)
            * context.total_value)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);

        let available = match signal.direction {
            SignalDirection::Buy => context.available_cash.max(Decimal::ZERO),
            SignalDirection::Sell => context
                .holdings
                .get(&signal.symbol)
                .map(|h| h.market_value.max(Decimal::ZERO))
                .unwrap_or(Decimal::ZERO),
            SignalDirection::Hold => Decimal::ZERO,
        };
        if dollar_amount > available {
            dollar_amount = available;
            reasoning.push_str(match signal.direction {
                SignalDirection::Sell => " (limited by current holding)",
                _ => " (limited by available cash)",
            });
        }

        let mut shares = if signal.price > Decimal::ZERO {
            (dollar_amount / signal.price).floor().to_u64().unwrap_or(0)
        } else {
            0
        };
        if signal.direction == SignalDirection::Sell {
            if let Some(holding) = context.holdings.get(&signal.symbol) {
                shares = shares.min(holding.shares);
            }
        }

        let portfolio_percentage = (dollar_amount / context.total_value).to_f64().unwrap_or(0.0);

        debug!(
            symbol = %signal.symbol,
            algorithm = self.as_str(),
            portfolio_percentage,
            shares,
            "Sized position"
        );

        PositionSize {
            algorithm: *self,
            shares,
            dollar_amount,
            portfolio_percentage,
            confidence,
            risk_adjustment,
            reasoning,
        }
    }

    /// Unconstrained target fraction, the algorithm's scaling factor and a
    /// description of the inputs.
    fn target_percentage(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
        config: &SizingConfig,
    ) -> (f64, f64, String) {
        let confidence = signal.confidence_fraction();

        match self {
            Self::ConfidenceBased => {
                let pct = config.base_allocation * confidence;
                (
                    pct,
                    confidence,
                    format!(
                        "Confidence-based sizing: base allocation {:.1}% x confidence {:.0}% \
                         = {:.2}%",
                        config.base_allocation * 100.0,
                        confidence * 100.0,
                        pct * 100.0
                    ),
                )
            }
            Self::Kelly => {
                let b = config.payoff_ratio;
                let full_kelly = (confidence * b - (1.0 - confidence)) / b;
                let pct = (full_kelly * config.kelly_fraction).max(0.0);
                (
                    pct,
                    config.kelly_fraction,
                    format!(
                        "Kelly sizing: win probability {:.2}, payoff {:.2}, \
                         full Kelly {:.2}% x fraction {:.2} = {:.2}%",
                        confidence,
                        b,
                        full_kelly * 100.0,
                        config.kelly_fraction,
                        pct * 100.0
                    ),
                )
            }
            Self::RiskParity => {
                let own_vol = config.symbol_volatility(context, &signal.symbol);
                let others: f64 = context
                    .holdings
                    .keys()
                    .filter(|s| **s != signal.symbol)
                    .map(|s| 1.0 / config.symbol_volatility(context, s))
                    .sum();
                let share = (1.0 / own_vol) / (1.0 / own_vol + others);
                let assets = 1 + context.holdings.keys().filter(|s| **s != signal.symbol).count();
                (
                    share,
                    share,
                    format!(
                        "Risk parity sizing: volatility {:.1}%, \
                         inverse-volatility share among {} assets = {:.2}%",
                        own_vol * 100.0,
                        assets,
                        share * 100.0
                    ),
                )
            }
            Self::VolatilityAdjusted => {
                let vol = config.symbol_volatility(context, &signal.symbol);
                let scale = config.reference_volatility / vol;
                let pct = config.base_allocation * scale;
                (
                    pct,
                    scale,
                    format!(
                        "Volatility-adjusted sizing: base allocation {:.1}% x reference {:.1}% \
                         / volatility {:.1}% = {:.2}%",
                        config.base_allocation * 100.0,
                        config.reference_volatility * 100.0,
                        vol * 100.0,
                        pct * 100.0
                    ),
                )
            }
        }
    }
}

/// A sized position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub algorithm: SizingAlgorithm,
    pub shares: u64,
    pub dollar_amount: Decimal,
    /// Fraction of total portfolio value.
    pub portfolio_percentage: f64,
    /// Signal confidence as a fraction in [0, 1].
    pub confidence: f64,
    /// Scaling factor the algorithm applied.
    pub risk_adjustment: f64,
    pub reasoning: String,
}

impl PositionSize {
    fn empty(algorithm: SizingAlgorithm, confidence: f64, reasoning: &str) -> Self {
        Self {
            algorithm,
            shares: 0,
            dollar_amount: Decimal::ZERO,
            portfolio_percentage: 0.0,
            confidence,
            risk_adjustment: 0.0,
            reasoning: reasoning.to_string(),
        }
    }
}

/// Portfolio-level risk of taking the position. `None` when the inputs
/// needed to estimate a value are missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Weighted sum of annualized asset volatilities including the new position.
    pub portfolio_risk: Option<f64>,
    /// Largest absolute correlation with any other holding.
    pub correlation_risk: Option<f64>,
}

/// A sized position with its risk assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizeRecommendation {
    pub signal: TradingSignal,
    pub position_size: PositionSize,
    pub risk_assessment: RiskAssessment,
    pub approval_required: bool,
    /// Sizes from the other algorithms, populated when approval is required.
    pub alternatives: Vec<PositionSize>,
}

/// Position sizer producing recommendations.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Recommend a position using the configured algorithm.
    pub fn recommend(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
    ) -> PositionSizeRecommendation {
        self.recommend_with(signal, context, self.config.algorithm)
    }

    /// Recommend a position using `algorithm`.
    pub fn recommend_with(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
        algorithm: SizingAlgorithm,
    ) -> PositionSizeRecommendation {
        let position_size = algorithm.compute_size(signal, context, &self.config);
        let risk_assessment = self.assess(signal, context, &position_size);

        let approval_required = position_size.portfolio_percentage > self.config.approval_threshold
            || signal.risk_level == RiskLevel::High;

        let alternatives = if approval_required {
            SizingAlgorithm::ALL
                .iter()
                .filter(|alt| **alt != algorithm)
                .map(|alt| alt.compute_size(signal, context, &self.config))
                .collect()
        } else {
            Vec::new()
        };

        PositionSizeRecommendation {
            signal: signal.clone(),
            position_size,
            risk_assessment,
            approval_required,
            alternatives,
        }
    }

    fn assess(
        &self,
        signal: &TradingSignal,
        context: &PortfolioContext,
        size: &PositionSize,
    ) -> RiskAssessment {
        let portfolio_risk = (context.total_value > Decimal::ZERO).then(|| {
            let existing: f64 = context
                .weights()
                .iter()
                .map(|(symbol, weight)| weight * self.config.symbol_volatility(context, symbol))
                .sum();
            existing
                + size.portfolio_percentage * self.config.symbol_volatility(context, &signal.symbol)
        });
        let portfolio_risk = portfolio_risk.filter(|risk| risk.is_finite());

        RiskAssessment {
            portfolio_risk,
            correlation_risk: Self::correlation_risk(signal, context),
        }
    }

    fn correlation_risk(signal: &TradingSignal, context: &PortfolioContext) -> Option<f64> {
        let others: Vec<&String> = context
            .holdings
            .keys()
            .filter(|s| **s != signal.symbol)
            .collect();
        if others.is_empty() {
            return Some(0.0);
        }

        let own = context.returns.get(&signal.symbol).filter(|r| r.len() >= 2)?;
        others.iter().try_fold(0.0_f64, |max, symbol| {
            let series = context.returns.get(*symbol).filter(|r| r.len() >= 2)?;
            let correlation = stats::correlation(own, series);
            // A NaN correlation is unknown, not zero
            correlation.is_finite().then(|| max.max(correlation.abs()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Holding;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn signal(direction: SignalDirection, confidence: f64) -> TradingSignal {
        TradingSignal {
            symbol: "AAPL".to_string(),
            direction,
            strength: 0.7,
            confidence,
            timestamp: Utc::now(),
            price: dec!(150),
            reasoning: "Momentum".to_string(),
            risk_level: RiskLevel::Medium,
        }
    }

    fn context() -> PortfolioContext {
        let mut holdings = BTreeMap::new();
        holdings.insert(
            "MSFT".to_string(),
            Holding {
                shares: 50,
                market_value: dec!(20_000),
            },
        );
        PortfolioContext {
            total_value: dec!(100_000),
            available_cash: dec!(50_000),
            holdings,
            returns: BTreeMap::new(),
        }
    }

    #[test]
    fn test_confidence_based() {
        let config = SizingConfig::default();
        let size = SizingAlgorithm::ConfidenceBased.compute_size(
            &signal(SignalDirection::Buy, 75.0),
            &context(),
            &config,
        );

        // 10% x 0.75 = 7.5% of $100K = $7,500 -> 50 shares at $150
        assert_eq!(size.dollar_amount, dec!(7500));
        assert_eq!(size.shares, 50);
        assert!((size.portfolio_percentage - 0.075).abs() < 1e-9);
        assert!((size.confidence - 0.75).abs() < 1e-12);
        assert!(size.reasoning.contains("Confidence-based"));
    }

    #[test]
    fn test_capped_at_max_position() {
        let config = SizingConfig {
            base_allocation: 0.50,
            ..Default::default()
        };
        for algorithm in SizingAlgorithm::ALL {
            let size =
                algorithm.compute_size(&signal(SignalDirection::Buy, 100.0), &context(), &config);
            assert!(size.portfolio_percentage <= config.max_position_size);
        }
    }

    #[test]
    fn test_cap_holds_after_cent_rounding() {
        let config = SizingConfig {
            base_allocation: 0.50,
            ..Default::default()
        };
        let context = PortfolioContext {
            total_value: dec!(100_000.03),
            available_cash: dec!(100_000.03),
            ..context()
        };

        // 20% of 100,000.03 is 20,000.006; rounding up would exceed the cap
        for algorithm in SizingAlgorithm::ALL {
            let size =
                algorithm.compute_size(&signal(SignalDirection::Buy, 100.0), &context, &config);
            assert!(size.portfolio_percentage <= config.max_position_size);
        }
        let size = SizingAlgorithm::Kelly.compute_size(
            &signal(SignalDirection::Buy, 100.0),
            &context,
            &config,
        );
        assert_eq!(size.dollar_amount, dec!(20_000.00));
    }

    #[test]
    fn test_kelly() {
        let config = SizingConfig::default();

        // p = 0.6, b = 2: f* = (1.2 - 0.4) / 2 = 0.4, x 0.25 = 10%
        let size = SizingAlgorithm::Kelly.compute_size(
            &signal(SignalDirection::Buy, 60.0),
            &context(),
            &config,
        );
        assert!((size.portfolio_percentage - 0.10).abs() < 1e-9);
        assert!(size.reasoning.contains("Kelly"));

        // Negative edge sizes to zero
        let size = SizingAlgorithm::Kelly.compute_size(
            &signal(SignalDirection::Buy, 20.0),
            &context(),
            &config,
        );
        assert_eq!(size.shares, 0);
        assert_eq!(size.dollar_amount, Decimal::ZERO);
    }

    #[test]
    fn test_volatility_adjusted_uses_default_volatility() {
        let config = SizingConfig::default();
        let size = SizingAlgorithm::VolatilityAdjusted.compute_size(
            &signal(SignalDirection::Buy, 80.0),
            &context(),
            &config,
        );

        // 10% x 0.20 / 0.25 = 8%
        assert!((size.portfolio_percentage - 0.08).abs() < 1e-9);
        assert!((size.risk_adjustment - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_risk_parity_share() {
        let config = SizingConfig {
            max_position_size: 1.0,
            ..Default::default()
        };
        // AAPL and MSFT both at default volatility: equal shares
        let size = SizingAlgorithm::RiskParity.compute_size(
            &signal(SignalDirection::Buy, 80.0),
            &context(),
            &config,
        );
        // $50K is exactly the available cash
        assert!((size.portfolio_percentage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_buy_limited_by_cash() {
        let mut ctx = context();
        ctx.available_cash = dec!(1_000);

        let size = SizingAlgorithm::ConfidenceBased.compute_size(
            &signal(SignalDirection::Buy, 75.0),
            &ctx,
            &SizingConfig::default(),
        );
        assert_eq!(size.dollar_amount, dec!(1_000));
        assert_eq!(size.shares, 6);
        assert!(size.reasoning.contains("available cash"));
    }

    #[test]
    fn test_sell_limited_by_holding() {
        let config = SizingConfig::default();
        let mut sell = signal(SignalDirection::Sell, 75.0);

        // No AAPL holding: nothing to sell
        let size = SizingAlgorithm::ConfidenceBased.compute_size(&sell, &context(), &config);
        assert_eq!(size.shares, 0);

        sell.symbol = "MSFT".to_string();
        sell.price = dec!(400);
        let mut ctx = context();
        ctx.holdings.insert(
            "MSFT".to_string(),
            Holding {
                shares: 12,
                market_value: dec!(4_800),
            },
        );
        let size = SizingAlgorithm::ConfidenceBased.compute_size(&sell, &ctx, &config);
        assert_eq!(size.dollar_amount, dec!(4_800));
        assert_eq!(size.shares, 12);
    }

    #[test]
    fn test_hold_and_bad_price() {
        let config = SizingConfig::default();
        let size = SizingAlgorithm::Kelly.compute_size(
            &signal(SignalDirection::Hold, 90.0),
            &context(),
            &config,
        );
        assert_eq!(size.shares, 0);
        assert_eq!(size.portfolio_percentage, 0.0);

        let mut free = signal(SignalDirection::Buy, 75.0);
        free.price = Decimal::ZERO;
        let size = SizingAlgorithm::ConfidenceBased.compute_size(&free, &context(), &config);
        assert_eq!(size.shares, 0);
        assert!(size.dollar_amount > Decimal::ZERO);
    }

    #[test]
    fn test_recommend_requires_approval_with_alternatives() {
        let sizer = PositionSizer::new(SizingConfig {
            base_allocation: 0.15,
            ..Default::default()
        });

        let rec = sizer.recommend(&signal(SignalDirection::Buy, 100.0), &context());
        assert!(rec.approval_required);
        assert_eq!(rec.alternatives.len(), 3);
        assert!(rec
            .alternatives
            .iter()
            .all(|alt| alt.algorithm != SizingAlgorithm::ConfidenceBased));
    }

    #[test]
    fn test_high_risk_signal_requires_approval() {
        let sizer = PositionSizer::default();
        let mut high = signal(SignalDirection::Buy, 50.0);
        high.risk_level = RiskLevel::High;

        let rec = sizer.recommend(&high, &context());
        assert!(rec.position_size.portfolio_percentage <= 0.10);
        assert!(rec.approval_required);
        assert!(!rec.alternatives.is_empty());

        let rec = sizer.recommend(&signal(SignalDirection::Buy, 50.0), &context());
        assert!(!rec.approval_required);
        assert!(rec.alternatives.is_empty());
    }

    #[test]
    fn test_risk_assessment() {
        let sizer = PositionSizer::default();
        let mut ctx = context();

        // AAPL has no history: correlation cannot be estimated
        let rec = sizer.recommend(&signal(SignalDirection::Buy, 75.0), &ctx);
        assert_eq!(rec.risk_assessment.correlation_risk, None);
        // 0.2 x 0.25 + 0.075 x 0.25
        let risk = rec.risk_assessment.portfolio_risk.unwrap();
        assert!((risk - 0.06875).abs() < 1e-9);

        let msft = vec![0.01, -0.02, 0.015, -0.005, 0.02];
        let aapl: Vec<f64> = msft.iter().map(|r| r * 2.0).collect();
        ctx.returns.insert("MSFT".to_string(), msft);
        ctx.returns.insert("AAPL".to_string(), aapl);
        let rec = sizer.recommend(&signal(SignalDirection::Buy, 75.0), &ctx);
        assert!((rec.risk_assessment.correlation_risk.unwrap() - 1.0).abs() < 1e-9);

        // No other holdings
        ctx.holdings.clear();
        let rec = sizer.recommend(&signal(SignalDirection::Buy, 75.0), &ctx);
        assert_eq!(rec.risk_assessment.correlation_risk, Some(0.0));
    }

    #[test]
    fn test_nan_correlation_is_unknown() {
        let sizer = PositionSizer::default();
        let mut ctx = context();
        ctx.returns
            .insert("MSFT".to_string(), vec![0.01, f64::NAN, 0.015, -0.005]);
        ctx.returns
            .insert("AAPL".to_string(), vec![0.02, -0.01, 0.01, 0.005]);

        let rec = sizer.recommend(&signal(SignalDirection::Buy, 75.0), &ctx);
        assert_eq!(rec.risk_assessment.correlation_risk, None);
        assert!(rec.risk_assessment.portfolio_risk.is_some());
    }
}
