//! Descriptive statistics over return series.
//!
//! Every function tolerates empty input and returns 0.0 rather than NaN when
//! a quantity is undefined (too few observations, zero denominators).

use std::cmp::Ordering;

use crate::data::ReturnSeries;

/// Largest representable drawdown below 100%.
pub const MAX_DRAWDOWN: f64 = 1.0 - f64::EPSILON;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    // Exact zero for constant series; the two-pass sum leaves rounding residue.
    if values.iter().all(|v| *v == values[0]) {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Sample covariance over the overlapping prefix of both series.
pub fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = mean(a);
    let mean_b = mean(b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation over the overlapping prefix. Zero when either side
/// has no variance.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let sd_a = std_dev(&a[..n]);
    let sd_b = std_dev(&b[..n]);
    if sd_a == 0.0 || sd_b == 0.0 {
        return 0.0;
    }
    (covariance(a, b) / (sd_a * sd_b)).clamp(-1.0, 1.0)
}

/// Percentile with linear interpolation between order statistics.
///
/// `p` is a fraction in [0, 1]; it is clamped into range.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    percentile_sorted(&sorted, p)
}

/// Percentile of an already ascending-sorted slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Root-mean-square of shortfalls below `target`, over all observations.
pub fn downside_deviation(values: &[f64], target: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values
        .iter()
        .map(|r| (r - target).min(0.0).powi(2))
        .sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Largest peak-to-trough decline of the compounded wealth path, as a
/// fraction of the peak. Starts from a wealth of 1.0.
///
/// Wealth is floored at zero, so a total loss reports `MAX_DRAWDOWN`.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;

    for r in returns {
        wealth = (wealth * (1.0 + r)).max(0.0);
        if wealth > peak {
            peak = wealth;
        } else if peak > 0.0 {
            let dd = (peak - wealth) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd.clamp(0.0, MAX_DRAWDOWN)
}

/// Sharpe ratio per period: (mean - risk_free) / std-dev.
pub fn sharpe_ratio(returns: &[f64], risk_free: f64) -> f64 {
    let sd = std_dev(returns);
    if sd == 0.0 {
        return 0.0;
    }
    (mean(returns) - risk_free) / sd
}

/// Sortino ratio per period: (mean - risk_free) / downside deviation.
pub fn sortino_ratio(returns: &[f64], risk_free: f64) -> f64 {
    let dd = downside_deviation(returns, risk_free);
    if dd == 0.0 {
        return 0.0;
    }
    (mean(returns) - risk_free) / dd
}

/// Sample covariance matrix for `symbols`, in the order given. Symbols
/// missing from `returns` get a zero row and column.
pub fn covariance_matrix(returns: &ReturnSeries, symbols: &[String]) -> Vec<Vec<f64>> {
    let empty: Vec<f64> = Vec::new();
    let series: Vec<&Vec<f64>> = symbols
        .iter()
        .map(|s| returns.get(s).unwrap_or(&empty))
        .collect();

    series
        .iter()
        .map(|a| series.iter().map(|b| covariance(a, b)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let values = [0.01, -0.02, 0.03, 0.00];
        assert!((mean(&values) - 0.005).abs() < 1e-12);
        // Sample variance: sum of squared deviations / 3
        let expected =
            (0.005_f64.powi(2) + 0.025_f64.powi(2) + 0.025_f64.powi(2) + 0.005_f64.powi(2)) / 3.0;
        assert!((variance(&values) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(variance(&[0.01]), 0.0);
        assert_eq!(percentile(&[], 0.05), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(sharpe_ratio(&[], 0.0), 0.0);
        assert_eq!(sortino_ratio(&[0.01, 0.02], 0.0), 0.0);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert!((percentile(&values, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        // 1.0 -> 1.1 -> 0.88 -> 0.968
        let returns = [0.10, -0.20, 0.10];
        assert!((max_drawdown(&returns) - 0.20).abs() < 1e-12);

        // Monotonic gains never draw down
        assert_eq!(max_drawdown(&[0.01, 0.02, 0.03]), 0.0);
    }

    #[test]
    fn test_max_drawdown_total_loss_stays_below_one() {
        let dd = max_drawdown(&[0.01, -1.0, 0.02]);
        assert!(dd < 1.0);
        assert_eq!(dd, MAX_DRAWDOWN);

        // Losses beyond 100% cannot push wealth negative
        let dd = max_drawdown(&[0.05, -1.5]);
        assert!((0.0..1.0).contains(&dd));
    }

    #[test]
    fn test_correlation_bounds() {
        let a = [0.01, 0.02, -0.01, 0.03];
        let b = [0.02, 0.04, -0.02, 0.06];
        assert!((correlation(&a, &b) - 1.0).abs() < 1e-12);

        let c = [-0.02, -0.04, 0.02, -0.06];
        assert!((correlation(&a, &c) + 1.0).abs() < 1e-12);

        let flat = [0.01, 0.01, 0.01, 0.01];
        assert_eq!(correlation(&a, &flat), 0.0);
    }

    #[test]
    fn test_downside_deviation_ignores_gains() {
        let returns = [0.05, -0.02, 0.03, -0.04];
        let expected = ((0.02_f64.powi(2) + 0.04_f64.powi(2)) / 4.0).sqrt();
        assert!((downside_deviation(&returns, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_matrix_missing_symbol() {
        let mut returns = ReturnSeries::new();
        returns.insert("A".to_string(), vec![0.01, 0.02, 0.03]);
        let symbols = vec!["A".to_string(), "B".to_string()];

        let cov = covariance_matrix(&returns, &symbols);
        assert_eq!(cov.len(), 2);
        assert!((cov[0][0] - 0.0001).abs() < 1e-12);
        assert_eq!(cov[0][1], 0.0);
        assert_eq!(cov[1][1], 0.0);
    }
}
