//! Benchmark-relative statistics: regression beta/alpha and tracking error.

use serde::{Deserialize, Serialize};

use super::descriptive::{covariance, mean, std_dev, variance};

/// Result of regressing portfolio returns on benchmark returns.
///
/// All values are per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRegression {
    pub beta: f64,
    /// Jensen's alpha: excess return not explained by beta.
    pub alpha: f64,
    /// Std-dev of active (portfolio - benchmark) returns.
    pub tracking_error: f64,
    /// Mean active return over tracking error.
    pub information_ratio: f64,
    /// Number of overlapping periods used.
    pub observations: usize,
}

impl Default for BenchmarkRegression {
    /// The "no benchmark" result: the portfolio is its own benchmark.
    fn default() -> Self {
        Self {
            beta: 1.0,
            alpha: 0.0,
            tracking_error: 0.0,
            information_ratio: 0.0,
            observations: 0,
        }
    }
}

/// Regress `portfolio` on `benchmark` over their overlapping prefix.
///
/// A benchmark with no variance carries no information about sensitivity,
/// so beta is reported as 0 and all return is attributed to alpha.
pub fn regress(portfolio: &[f64], benchmark: &[f64], risk_free: f64) -> BenchmarkRegression {
    let n = portfolio.len().min(benchmark.len());
    if n == 0 {
        return BenchmarkRegression::default();
    }
    let (p, b) = (&portfolio[..n], &benchmark[..n]);

    let bench_var = variance(b);
    let beta = if bench_var > 0.0 {
        covariance(p, b) / bench_var
    } else {
        0.0
    };
    let alpha = (mean(p) - risk_free) - beta * (mean(b) - risk_free);

    let active: Vec<f64> = p.iter().zip(b).map(|(x, y)| x - y).collect();
    let tracking_error = std_dev(&active);
    let information_ratio = if tracking_error > 0.0 {
        mean(&active) / tracking_error
    } else {
        0.0
    };

    BenchmarkRegression {
        beta,
        alpha,
        tracking_error,
        information_ratio,
        observations: n,
    }
}
