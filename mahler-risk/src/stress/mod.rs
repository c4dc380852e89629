//! Stress testing module.
//!
//! Provides:
//! - Scenario application against baseline risk metrics
//! - Severity classification (configurable thresholds)
//! - Worst-case and probability-weighted aggregation
//! - Standard historical scenarios

pub mod engine;

pub use engine::{
    ScenarioImpact, ScenarioResult, Severity, StressConfig, StressTestReport, StressTestScenario,
    StressTester,
};
