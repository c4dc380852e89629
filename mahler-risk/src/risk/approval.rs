//! Position approval workflow.
//!
//! Scores each recommendation against risk-factor thresholds:
//! - No factors: approve unchanged
//! - One or two factors without high portfolio risk: approve a reduced size
//! - Otherwise: reject, naming the triggered factors
//!
//! A recommendation whose risk assessment is incomplete is rejected.

use rayon::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::position_sizer::PositionSizeRecommendation;
use crate::error::{RiskError, RiskResult};

/// Approval thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalThresholds {
    /// Position fraction above which concentration is high.
    pub concentration: f64,
    /// Portfolio risk above which a position cannot be modified into approval.
    pub portfolio_risk: f64,
    /// Absolute correlation above which correlation is high.
    pub correlation: f64,
    /// Confidence fraction below which confidence is low.
    pub min_confidence: f64,
    /// Portfolio risk above which modifications use `strong_reduction`.
    pub modify_risk_cutoff: f64,
    /// Fraction of the position retained under elevated portfolio risk.
    pub strong_reduction: f64,
    /// Fraction of the position retained otherwise.
    pub default_reduction: f64,
}

impl Default for ApprovalThresholds {
    fn default() -> Self {
        Self {
            concentration: 0.15,
            portfolio_risk: 0.20,
            correlation: 0.70,
            min_confidence: 0.60,
            modify_risk_cutoff: 0.15,
            strong_reduction: 0.5,
            default_reduction: 0.7,
        }
    }
}

impl ApprovalThresholds {
    pub fn validate(&self) -> RiskResult<()> {
        for (name, value) in [
            ("strong_reduction", self.strong_reduction),
            ("default_reduction", self.default_reduction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RiskError::invalid(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Risk factors evaluated for one recommendation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub high_concentration: bool,
    pub high_portfolio_risk: bool,
    pub high_correlation: bool,
    pub low_confidence: bool,
    pub requires_approval: bool,
}

impl RiskFactors {
    pub fn count(&self) -> usize {
        self.flags().iter().filter(|(_, set)| *set).count()
    }

    /// Names of the triggered factors.
    pub fn names(&self) -> Vec<&'static str> {
        self.flags()
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect()
    }

    fn flags(&self) -> [(&'static str, bool); 5] {
        [
            ("high_concentration", self.high_concentration),
            ("high_portfolio_risk", self.high_portfolio_risk),
            ("high_correlation", self.high_correlation),
            ("low_confidence", self.low_confidence),
            ("requires_approval", self.requires_approval),
        ]
    }
}

/// Outcome of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Modify,
    Reject,
}

/// Review decision with the (possibly modified) recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub action: ApprovalAction,
    pub recommendation: PositionSizeRecommendation,
    pub risk_factors: RiskFactors,
    pub risk_count: usize,
    pub reason: String,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        self.action != ApprovalAction::Reject
    }
}

/// Approval workflow over position recommendations.
#[derive(Debug, Clone, Default)]
pub struct ApprovalWorkflow {
    thresholds: ApprovalThresholds,
}

impl ApprovalWorkflow {
    pub fn new(thresholds: ApprovalThresholds) -> Self {
        Self { thresholds }
    }

    /// Review a single recommendation.
    pub fn review(&self, recommendation: &PositionSizeRecommendation) -> ApprovalDecision {
        let assessment = &recommendation.risk_assessment;
        let finite = |value: Option<f64>| value.filter(|v| v.is_finite());
        let (portfolio_risk, correlation_risk) =
            match (finite(assessment.portfolio_risk), finite(assessment.correlation_risk)) {
                (Some(p), Some(c)) => (p, c),
                (p, _) => {
                    let missing = if p.is_none() { "portfolio_risk" } else { "correlation_risk" };
                    debug!(
                        symbol = %recommendation.signal.symbol,
                        direction = recommendation.signal.direction.as_str(),
                        missing,
                        "Rejecting on missing data"
                    );
                    return ApprovalDecision {
                        action: ApprovalAction::Reject,
                        recommendation: recommendation.clone(),
                        risk_factors: RiskFactors::default(),
                        risk_count: 0,
                        reason: format!("Rejected: cannot evaluate {} (missing data)", missing),
                    };
                }
            };

        let t = &self.thresholds;
        let size = &recommendation.position_size;
        let risk_factors = RiskFactors {
            high_concentration: size.portfolio_percentage > t.concentration,
            high_portfolio_risk: portfolio_risk > t.portfolio_risk,
            high_correlation: correlation_risk > t.correlation,
            low_confidence: size.confidence < t.min_confidence,
            requires_approval: recommendation.approval_required,
        };
        let risk_count = risk_factors.count();

        let (action, recommendation, reason) = if risk_count == 0 {
            (
                ApprovalAction::Approve,
                recommendation.clone(),
                "Approved: no risk factors triggered".to_string(),
            )
        } else if risk_count <= 2 && !risk_factors.high_portfolio_risk {
            let retain = if portfolio_risk > t.modify_risk_cutoff {
                t.strong_reduction
            } else {
                t.default_reduction
            };
            (
                ApprovalAction::Modify,
                Self::scaled(recommendation, retain),
                format!(
                    "Modified to {:.0}% of requested size: {}",
                    retain * 100.0,
                    risk_factors.names().join(", ")
                ),
            )
        } else {
            (
                ApprovalAction::Reject,
                recommendation.clone(),
                format!("Rejected: {}", risk_factors.names().join(", ")),
            )
        };

        debug!(
            symbol = %recommendation.signal.symbol,
            ?action,
            risk_count,
            "Reviewed position"
        );

        ApprovalDecision {
            action,
            recommendation,
            risk_factors,
            risk_count,
            reason,
        }
    }

    /// Review recommendations in parallel, preserving input order.
    pub fn review_batch(
        &self,
        recommendations: &[PositionSizeRecommendation],
    ) -> Vec<ApprovalDecision> {
        recommendations.par_iter().map(|r| self.review(r)).collect()
    }

    fn scaled(
        recommendation: &PositionSizeRecommendation,
        retain: f64,
    ) -> PositionSizeRecommendation {
        let mut modified = recommendation.clone();
        let size = &mut modified.position_size;
        size.shares = (size.shares as f64 * retain).floor() as u64;
        size.dollar_amount = (size.dollar_amount
            * Decimal::from_f64(retain).unwrap_or(Decimal::ONE))
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        size.portfolio_percentage *= retain;
        size.reasoning
            .push_str(&format!(" (reduced to {:.0}% on review)", retain * 100.0));
        modified.approval_required = false;
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RiskLevel, SignalDirection, TradingSignal};
    use crate::risk::position_sizer::{PositionSize, RiskAssessment, SizingAlgorithm};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn recommendation(
        pct: f64,
        confidence: f64,
        portfolio_risk: f64,
        correlation: f64,
    ) -> PositionSizeRecommendation {
        PositionSizeRecommendation {
            signal: TradingSignal {
                symbol: "NVDA".to_string(),
                direction: SignalDirection::Buy,
                strength: 0.6,
                confidence: confidence * 100.0,
                timestamp: Utc::now(),
                price: dec!(100),
                reasoning: "Earnings beat".to_string(),
                risk_level: RiskLevel::Medium,
            },
            position_size: PositionSize {
                algorithm: SizingAlgorithm::ConfidenceBased,
                shares: 100,
                dollar_amount: dec!(10_000),
                portfolio_percentage: pct,
                confidence,
                risk_adjustment: confidence,
                reasoning: "test".to_string(),
            },
            risk_assessment: RiskAssessment {
                portfolio_risk: Some(portfolio_risk),
                correlation_risk: Some(correlation),
            },
            approval_required: false,
            alternatives: Vec::new(),
        }
    }

    #[test]
    fn test_approve_unchanged() {
        let rec = recommendation(0.05, 0.80, 0.10, 0.30);
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Approve);
        assert_eq!(decision.risk_count, 0);
        assert_eq!(decision.recommendation.position_size, rec.position_size);
    }

    #[test]
    fn test_modify_concentration_and_low_confidence() {
        let mut rec = recommendation(0.18, 0.50, 0.10, 0.30);
        rec.approval_required = false;
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Modify);
        assert_eq!(decision.risk_count, 2);
        assert!(decision.risk_factors.high_concentration);
        assert!(decision.risk_factors.low_confidence);

        // Portfolio risk 0.10 <= 0.15: retain 70%
        let size = &decision.recommendation.position_size;
        assert!(size.portfolio_percentage < 0.18);
        assert!((size.portfolio_percentage - 0.126).abs() < 1e-12);
        assert_eq!(size.shares, 70);
        assert_eq!(size.dollar_amount, dec!(7_000));
        assert!(!decision.recommendation.approval_required);
    }

    #[test]
    fn test_modify_strong_reduction() {
        let rec = recommendation(0.18, 0.80, 0.17, 0.30);
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Modify);
        assert_eq!(decision.recommendation.position_size.shares, 50);
        assert!((decision.recommendation.position_size.portfolio_percentage - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_high_portfolio_risk_rejects() {
        let rec = recommendation(0.05, 0.80, 0.25, 0.30);
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Reject);
        assert_eq!(decision.risk_count, 1);
        assert!(decision.reason.contains("high_portfolio_risk"));
    }

    #[test]
    fn test_reject_all_factors() {
        let mut rec = recommendation(0.30, 0.40, 0.30, 0.90);
        rec.approval_required = true;
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Reject);
        assert_eq!(decision.risk_count, 5);
        for name in [
            "high_concentration",
            "high_portfolio_risk",
            "high_correlation",
            "low_confidence",
            "requires_approval",
        ] {
            assert!(decision.reason.contains(name), "missing {}", name);
        }
        assert!(!decision.is_approved());
    }

    #[test]
    fn test_missing_data_rejects() {
        let mut rec = recommendation(0.05, 0.80, 0.10, 0.30);
        rec.risk_assessment.correlation_risk = None;
        let decision = ApprovalWorkflow::default().review(&rec);

        assert_eq!(decision.action, ApprovalAction::Reject);
        assert!(decision.reason.contains("correlation_risk"));
    }

    #[test]
    fn test_non_finite_risk_rejects() {
        let rec = recommendation(0.05, 0.80, f64::NAN, 0.30);
        let decision = ApprovalWorkflow::default().review(&rec);
        assert_eq!(decision.action, ApprovalAction::Reject);
        assert!(decision.reason.contains("portfolio_risk"));

        let rec = recommendation(0.05, 0.80, 0.10, f64::INFINITY);
        let decision = ApprovalWorkflow::default().review(&rec);
        assert_eq!(decision.action, ApprovalAction::Reject);
        assert!(decision.reason.contains("correlation_risk"));
    }

    #[test]
    fn test_batch_preserves_order() {
        let recs = vec![
            recommendation(0.05, 0.80, 0.10, 0.30),
            recommendation(0.30, 0.40, 0.30, 0.90),
            recommendation(0.18, 0.50, 0.10, 0.30),
        ];
        let decisions = ApprovalWorkflow::default().review_batch(&recs);

        let actions: Vec<ApprovalAction> = decisions.iter().map(|d| d.action).collect();
        assert_eq!(
            actions,
            vec![ApprovalAction::Approve, ApprovalAction::Reject, ApprovalAction::Modify]
        );
    }
}
