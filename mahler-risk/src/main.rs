//! Mahler Risk CLI
//!
//! Reads a portfolio snapshot (weights, returns, optional benchmark) as JSON
//! and prints results as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Full report with the standard historical scenarios
//! mahler-risk report --input portfolio.json --historical-scenarios
//!
//! # Report with operator-authored scenarios and custom limits
//! mahler-risk report --input portfolio.json --config risk.toml --scenarios scenarios.json
//!
//! # 10-day 99% Monte Carlo VaR
//! mahler-risk var --input portfolio.json --method monte-carlo --confidence 0.99 --horizon 10
//!
//! # Allocate a 12% annualized volatility budget
//! mahler-risk budget --input portfolio.json --total 0.12
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use mahler_risk::{
    PortfolioSnapshot, RiskEngine, RiskEngineConfig, StressTestScenario, StressTester, VarMethod,
    VarParams,
};

/// Portfolio risk engine CLI.
#[derive(Parser)]
#[command(name = "mahler-risk")]
#[command(about = "Portfolio risk metrics, VaR, stress testing and risk budgeting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Risk engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Risk report: metrics, VaR, limit compliance and stress results
    Report {
        /// Portfolio snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Stress scenarios (JSON array)
        #[arg(short, long)]
        scenarios: Option<PathBuf>,

        /// Include the standard historical crisis scenarios
        #[arg(long)]
        historical_scenarios: bool,
    },

    /// Value-at-Risk of the portfolio return series
    Var {
        /// Portfolio snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "historical")]
        method: MethodArg,

        #[arg(long, default_value_t = 0.95)]
        confidence: f64,

        /// Horizon in periods
        #[arg(long, default_value_t = 1)]
        horizon: u32,

        /// Monte Carlo simulation count
        #[arg(long, default_value_t = mahler_risk::var::DEFAULT_SIMULATIONS)]
        simulations: usize,

        /// Monte Carlo seed
        #[arg(long, default_value_t = mahler_risk::var::DEFAULT_SEED)]
        seed: u64,
    },

    /// Allocate a total risk budget across the portfolio
    Budget {
        /// Portfolio snapshot (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Total risk budget as annualized volatility
        #[arg(short, long)]
        total: f64,

        /// Also report equal-risk-contribution target weights
        #[arg(long)]
        risk_parity: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Historical,
    Parametric,
    MonteCarlo,
}

#[derive(Serialize)]
struct BudgetOutput {
    budget: mahler_risk::RiskBudget,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_parity_weights: Option<mahler_risk::PortfolioWeights>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_engine(config: Option<&Path>) -> Result<RiskEngine> {
    let config = match config {
        Some(path) => RiskEngineConfig::from_file(path)
            .with_context(|| format!("Invalid config {}", path.display()))?,
        None => RiskEngineConfig::default(),
    };
    Ok(RiskEngine::new(config)?)
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mahler_risk=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let engine = load_engine(cli.config.as_deref())?;

    match cli.command {
        Commands::Report {
            input,
            scenarios,
            historical_scenarios,
        } => {
            let snapshot: PortfolioSnapshot = read_json(&input)?;
            let mut all_scenarios: Vec<StressTestScenario> = match scenarios {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            if historical_scenarios {
                all_scenarios.extend(StressTester::historical_scenarios());
            }

            let report = engine
                .portfolio_report(&snapshot, &all_scenarios)
                .context("Failed to build risk report")?;
            print_json(&report)?;
        }
        Commands::Var {
            input,
            method,
            confidence,
            horizon,
            simulations,
            seed,
        } => {
            let snapshot: PortfolioSnapshot = read_json(&input)?;
            let params = VarParams {
                method: match method {
                    MethodArg::Historical => VarMethod::Historical,
                    MethodArg::Parametric => VarMethod::Parametric,
                    MethodArg::MonteCarlo => VarMethod::MonteCarlo { simulations, seed },
                },
                confidence_level: confidence,
                time_horizon: horizon,
            };

            let var = engine
                .portfolio_var(&snapshot.weights, &snapshot.returns, Some(&params))
                .context("Failed to calculate VaR")?;
            print_json(&var)?;
        }
        Commands::Budget {
            input,
            total,
            risk_parity,
        } => {
            let snapshot: PortfolioSnapshot = read_json(&input)?;
            let budget = engine
                .estimate_risk_budget(&snapshot.weights, &snapshot.returns, total)
                .context("Failed to allocate risk budget")?;
            let risk_parity_weights = if risk_parity {
                Some(engine.risk_parity_targets(&snapshot.weights, &snapshot.returns)?)
            } else {
                None
            };

            print_json(&BudgetOutput {
                budget,
                risk_parity_weights,
            })?;
        }
    }

    Ok(())
}
