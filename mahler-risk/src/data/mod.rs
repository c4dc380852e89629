pub mod types;

pub use types::{
    Holding, PortfolioContext, PortfolioSnapshot, PortfolioWeights, ReturnSeries, RiskLevel,
    SignalDirection, TradingSignal,
};
