//! Rebalancing module.
//!
//! Provides:
//! - Drift signals between current and target weights
//! - Priority and urgency ranking
//! - Implementation plan (timeline, cost, risk impact)

pub mod signals;

pub use signals::{
    ImplementationPlan, RebalanceConfig, RebalanceGenerator, RebalancePlan, RebalanceSignal,
    RiskImpact, Timeline, Urgency,
};
