use rand::Rng;
use serde::Serialize;
use tracing::{error, info};

use crate::assumptions::{AssumptionOverrides, Assumptions};
use crate::config::StressTestConfig;
use crate::drivers::{Driver, analyze};
use crate::error::FlowRiskError;
use crate::metrics::{ChartData, RiskReport, Summary, summarize};
use crate::scenario::ScenarioKind;
use crate::simulation::simulate;

/// Generated seeds are drawn from `[0, SEED_CEILING)`.
pub const SEED_CEILING: u64 = (1 << 31) - 1;

/// What was actually run: the seed is the one used, whether requested or
/// generated, so the report can be reproduced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMeta {
    pub horizon_months: u32,
    pub n_sims: u32,
    pub seed: u64,
    pub scenario: Option<ScenarioKind>,
    pub assumptions: Assumptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressTestReport {
    pub run: RunMeta,
    pub summary: Summary,
    pub chart: ChartData,
    pub drivers: Vec<Driver>,
}

/// Validate the request, settle the seed and assumptions, then simulate,
/// summarize and rank drivers.
///
/// Request errors are returned as-is. Anything that goes wrong once the
/// computation starts is logged and reported only as
/// [`FlowRiskError::ComputationFailed`].
pub fn execute(config: &StressTestConfig) -> Result<StressTestReport, FlowRiskError> {
    config.run.validate()?;
    let seed = config.run.seed.unwrap_or_else(generate_seed);
    let assumptions = Assumptions::resolve(&config.profile, &config.assumptions);

    let report = compute(config, seed, assumptions).map_err(|err| {
        if !matches!(err, FlowRiskError::ComputationFailed) {
            error!(error = %err, seed, "run computation failed");
        }
        FlowRiskError::ComputationFailed
    })?;

    info!(
        horizon_months = report.run.horizon_months,
        n_sims = report.run.n_sims,
        seed,
        scenario = report.run.scenario.map(|k| k.as_str()).unwrap_or("none"),
        p_fail = report.summary.p_fail,
        "stress test complete"
    );
    Ok(report)
}

pub fn generate_seed() -> u64 {
    rand::rng().random_range(0..SEED_CEILING)
}

fn compute(
    config: &StressTestConfig,
    seed: u64,
    assumptions: Assumptions,
) -> Result<StressTestReport, FlowRiskError> {
    let horizon = config.run.horizon_months;
    let n_sims = config.run.n_sims;
    let scenario = config.scenario.as_ref();
    // Pinned so the simulator and the analyzer see the same volatilities.
    let pinned = AssumptionOverrides::from(assumptions);

    let result = simulate(&config.profile, &config.debts, scenario, horizon, n_sims, seed, &pinned)?;
    let RiskReport { summary, chart } = summarize(&result);
    if !summary.is_finite() || !chart_is_finite(&chart) {
        error!(?summary, seed, "non-finite statistic in run output");
        return Err(FlowRiskError::ComputationFailed);
    }

    let drivers = analyze(&config.profile, &config.debts, scenario, horizon, n_sims, seed, &pinned)?;

    Ok(StressTestReport {
        run: RunMeta {
            horizon_months: horizon,
            n_sims,
            seed,
            scenario: scenario.map(|s| s.kind()),
            assumptions,
        },
        summary,
        chart,
        drivers,
    })
}

fn chart_is_finite(chart: &ChartData) -> bool {
    [&chart.cash_p10, &chart.cash_p50, &chart.cash_p90]
        .iter()
        .all(|series| series.iter().all(|v| v.is_finite()))
}
