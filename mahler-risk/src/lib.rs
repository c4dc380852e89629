pub mod budgeting;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod limits;
pub mod metrics;
pub mod rebalance;
pub mod regime;
pub mod risk;
pub mod stats;
pub mod stress;
pub mod var;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use budgeting::{RiskBudget, RiskBudgeter};
pub use config::RiskEngineConfig;
pub use data::{PortfolioContext, PortfolioSnapshot, PortfolioWeights, ReturnSeries, TradingSignal};
pub use engine::{RiskEngine, RiskReport};
pub use error::{RiskError, RiskResult};
pub use limits::{LimitCheckResult, RiskLimits, RiskLimitsChecker};
pub use metrics::{MetricsCalculator, RiskMetrics};
pub use rebalance::{RebalanceGenerator, RebalancePlan};
pub use regime::{MarketConditions, RegimeClassifier, VolatilityRegime};
pub use risk::{ApprovalWorkflow, PositionSizeRecommendation, PositionSizer, SizingAlgorithm};
pub use stress::{StressTestReport, StressTestScenario, StressTester};
pub use var::{VaRCalculation, VarEngine, VarMethod, VarParams};
