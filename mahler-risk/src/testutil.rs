//! Seeded synthetic data for unit tests.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::data::{PortfolioWeights, ReturnSeries};

/// `n` normally distributed returns, reproducible for a given seed.
pub fn normal_returns(n: usize, mean: f64, std_dev: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(mean, std_dev).expect("valid normal parameters");
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

/// Equal-weight portfolio over `symbols` with independent normal returns.
pub fn equal_weight_portfolio(
    symbols: &[&str],
    periods: usize,
    mean: f64,
    std_dev: f64,
) -> (PortfolioWeights, ReturnSeries) {
    let weight = 1.0 / symbols.len() as f64;
    let mut weights = PortfolioWeights::new();
    let mut returns = ReturnSeries::new();

    for (i, symbol) in symbols.iter().enumerate() {
        weights.insert(symbol.to_string(), weight);
        returns.insert(
            symbol.to_string(),
            normal_returns(periods, mean, std_dev, 1_000 + i as u64),
        );
    }

    (weights, returns)
}
