use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::debug;

use crate::assumptions::{AssumptionOverrides, Assumptions};
use crate::error::FlowRiskError;
use crate::profile::{Debt, FinancialProfile, to_f64};
use crate::scenario::{MonthFlows, Scenario, Shock};
use crate::types::Month;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationMeta {
    pub horizon_months: u32,
    pub n_sims: u32,
    pub seed: u64,
    pub assumptions_used: Assumptions,
}

/// Raw per-path output of one simulation call.
///
/// All per-path vectors have `n_sims` entries. Every cash path has
/// `horizon_months + 1` entries (index 0 is the opening balance) and every
/// payment path `horizon_months` entries; paths that failed early are
/// zero-padded after the failure point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub cash_paths: Vec<Vec<f64>>,
    pub failed: Vec<bool>,
    pub time_to_fail: Vec<Option<Month>>,
    pub min_cash: Vec<f64>,
    pub debt_payment_paths: Vec<Vec<f64>>,
    pub meta: SimulationMeta,
}

impl SimulationResult {
    pub fn n_paths(&self) -> usize {
        self.failed.len()
    }

    pub fn n_failed(&self) -> usize {
        self.failed.iter().filter(|&&f| f).count()
    }

    /// Unrounded failure probability. Zero when there are no paths.
    pub fn p_fail(&self) -> f64 {
        let n = self.n_paths();
        if n == 0 { 0.0 } else { self.n_failed() as f64 / n as f64 }
    }
}

struct PathOutcome {
    cash: Vec<f64>,
    payments: Vec<f64>,
    fail_month: Option<Month>,
    min_cash: f64,
}

/// Monthly-stepped Monte Carlo cash-flow simulator.
///
/// Owns a single generator seeded at construction. Paths are simulated one
/// after another and every draw advances that one generator, so the whole
/// output is a function of the inputs and the seed. Never split the path
/// loop across threads.
pub struct Simulation {
    rng: ChaCha20Rng,
    base: MonthFlows,
    initial_cash: f64,
    shock: Shock,
    income_noise: Option<Normal<f64>>,
    variable_noise: Option<Normal<f64>>,
    horizon_months: u32,
    n_sims: u32,
    seed: u64,
    assumptions: Assumptions,
}

impl Simulation {
    pub fn new(
        profile: &FinancialProfile,
        debts: &[Debt],
        scenario: Option<&Scenario>,
        horizon_months: u32,
        n_sims: u32,
        seed: u64,
        overrides: &AssumptionOverrides,
    ) -> Result<Self, FlowRiskError> {
        let assumptions = Assumptions::resolve(profile, overrides);

        Ok(Simulation {
            rng: ChaCha20Rng::seed_from_u64(seed),
            base: MonthFlows {
                income: to_f64(profile.monthly_income),
                fixed: to_f64(profile.fixed_expenses),
                variable: to_f64(profile.variable_expenses),
                debt_min: Debt::total_min_payment(debts),
            },
            initial_cash: to_f64(profile.liquid_savings),
            shock: scenario.map(|s| s.shock().clone()).unwrap_or(Shock::None),
            income_noise: noise("sigma_income", assumptions.sigma_income)?,
            variable_noise: noise("sigma_variable", assumptions.sigma_variable)?,
            horizon_months,
            n_sims,
            seed,
            assumptions,
        })
    }

    /// Simulate all paths, consuming the generator.
    pub fn run(mut self) -> SimulationResult {
        let n = self.n_sims as usize;
        let mut cash_paths = Vec::with_capacity(n);
        let mut failed = Vec::with_capacity(n);
        let mut time_to_fail = Vec::with_capacity(n);
        let mut min_cash = Vec::with_capacity(n);
        let mut debt_payment_paths = Vec::with_capacity(n);

        for _ in 0..n {
            let outcome = self.simulate_path();
            cash_paths.push(outcome.cash);
            failed.push(outcome.fail_month.is_some());
            time_to_fail.push(outcome.fail_month);
            min_cash.push(outcome.min_cash);
            debt_payment_paths.push(outcome.payments);
        }

        let result = SimulationResult {
            cash_paths,
            failed,
            time_to_fail,
            min_cash,
            debt_payment_paths,
            meta: SimulationMeta {
                horizon_months: self.horizon_months,
                n_sims: self.n_sims,
                seed: self.seed,
                assumptions_used: self.assumptions,
            },
        };
        debug!(
            seed = self.seed,
            n_sims = self.n_sims,
            horizon_months = self.horizon_months,
            n_failed = result.n_failed(),
            "simulation complete"
        );
        result
    }

    fn simulate_path(&mut self) -> PathOutcome {
        let horizon = self.horizon_months as usize;
        let mut cash = self.initial_cash;
        let mut path = Vec::with_capacity(horizon + 1);
        let mut payments = Vec::with_capacity(horizon);
        let mut min_cash = cash;
        let mut fail_month = None;
        path.push(cash);

        for month in Month::through(self.horizon_months) {
            let mut flows = self.base;
            self.shock.apply(month, &mut flows);

            // Draw order is part of the reproducibility contract: income
            // first (only when there is income to perturb), then variable.
            if let Some(noise) = &self.income_noise
                && flows.income > 0.0
            {
                let shock = noise.sample(&mut self.rng);
                flows.income = (flows.income * (1.0 + shock)).max(0.0);
            }
            if let Some(noise) = &self.variable_noise {
                let shock = noise.sample(&mut self.rng);
                flows.variable = (flows.variable * (1.0 + shock)).max(0.0);
            }

            let net_flow = flows.income - flows.fixed - flows.variable - flows.debt_min;
            let cash_next = cash + net_flow;

            // Second clause: pre-update cash cannot cover this month's
            // minimum and neither can what is left after spending.
            let cannot_cover_minimum = cash < flows.debt_min
                && cash + flows.income - flows.fixed - flows.variable < flows.debt_min;
            if cash_next < 0.0 || cannot_cover_minimum {
                fail_month = Some(month);
                break;
            }

            cash = cash_next;
            path.push(cash);
            payments.push(flows.debt_min);
            min_cash = min_cash.min(cash);
        }

        path.resize(horizon + 1, 0.0);
        payments.resize(horizon, 0.0);

        PathOutcome { cash: path, payments, fail_month, min_cash }
    }
}

/// A zero-mean normal for a fractional volatility, or `None` when the
/// volatility is not positive and no draw should be taken.
fn noise(name: &'static str, sigma: f64) -> Result<Option<Normal<f64>>, FlowRiskError> {
    let invalid = || FlowRiskError::InvalidAssumption { name, value: sigma };
    if !sigma.is_finite() {
        return Err(invalid());
    }
    if sigma <= 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, sigma).map(Some).map_err(|_| invalid())
}

/// Run a simulation in one call. See [`Simulation`].
pub fn simulate(
    profile: &FinancialProfile,
    debts: &[Debt],
    scenario: Option<&Scenario>,
    horizon_months: u32,
    n_sims: u32,
    seed: u64,
    overrides: &AssumptionOverrides,
) -> Result<SimulationResult, FlowRiskError> {
    Ok(Simulation::new(profile, debts, scenario, horizon_months, n_sims, seed, overrides)?.run())
}
