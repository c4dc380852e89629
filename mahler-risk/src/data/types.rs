//! Core data types shared by the risk engine.
//!
//! Weights and return series are keyed by symbol in sorted order, which is
//! also the row/column order expected of covariance matrices.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Symbol -> fraction of total portfolio value. Values are non-negative and
/// sum to at most 1; the remainder is cash.
pub type PortfolioWeights = BTreeMap<String, f64>;

/// Symbol -> periodic returns, oldest first. Series may differ in length.
pub type ReturnSeries = BTreeMap<String, Vec<f64>>;

/// Direction of a trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        }
    }
}

/// Risk level attached to a signal by the upstream analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A trading signal produced by upstream analysis. Consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Instrument symbol (e.g., "AAPL")
    pub symbol: String,

    /// Buy, sell or hold
    pub direction: SignalDirection,

    /// Signal strength as reported upstream
    pub strength: f64,

    /// Confidence on a 0-100 scale
    pub confidence: f64,

    /// When the signal was produced
    pub timestamp: DateTime<Utc>,

    /// Reference price for sizing
    pub price: Decimal,

    /// Free-form rationale from the producer
    pub reasoning: String,

    pub risk_level: RiskLevel,
}

impl TradingSignal {
    /// Confidence as a fraction in [0, 1].
    pub fn confidence_fraction(&self) -> f64 {
        (self.confidence / 100.0).clamp(0.0, 1.0)
    }
}

/// A single holding in the portfolio.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Holding {
    pub shares: u64,
    pub market_value: Decimal,
}

/// Portfolio state used for position sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioContext {
    /// Total portfolio value including cash.
    pub total_value: Decimal,
    /// Cash available for new purchases.
    pub available_cash: Decimal,
    /// Current holdings by symbol.
    #[serde(default)]
    pub holdings: BTreeMap<String, Holding>,
    /// Historical returns used for volatility and correlation estimates.
    #[serde(default)]
    pub returns: ReturnSeries,
}

impl PortfolioContext {
    /// Current weight of each holding as a fraction of total value.
    pub fn weights(&self) -> PortfolioWeights {
        let total: f64 = self.total_value.try_into().unwrap_or(0.0);
        if total <= 0.0 {
            return PortfolioWeights::new();
        }

        self.holdings
            .iter()
            .map(|(symbol, holding)| {
                let value: f64 = holding.market_value.try_into().unwrap_or(0.0);
                (symbol.clone(), value / total)
            })
            .collect()
    }
}

/// Weights and return history for one portfolio, as read by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub weights: PortfolioWeights,
    pub returns: ReturnSeries,
    /// Benchmark returns aligned with the asset series.
    #[serde(default)]
    pub benchmark: Option<Vec<f64>>,
    /// Per-period risk-free rate.
    #[serde(default)]
    pub risk_free_rate: f64,
}
