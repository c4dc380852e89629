//! Position risk module.
//!
//! Provides:
//! - Position sizing (confidence, Kelly, risk parity, volatility-adjusted)
//! - Per-position risk assessment (portfolio risk, correlation)
//! - Approval workflow (approve / modify / reject)

pub mod approval;
pub mod position_sizer;

pub use approval::{
    ApprovalAction, ApprovalDecision, ApprovalThresholds, ApprovalWorkflow, RiskFactors,
};
pub use position_sizer::{
    PositionSize, PositionSizeRecommendation, PositionSizer, RiskAssessment, SizingAlgorithm,
    SizingConfig,
};
