use std::cmp::Ordering;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::assumptions::AssumptionOverrides;
use crate::error::FlowRiskError;
use crate::metrics::round_to;
use crate::profile::{Debt, FinancialProfile, ProfileField};
use crate::scenario::Scenario;
use crate::simulation::simulate;

/// One-at-a-time change applied to a run's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perturbation {
    LiquidityUp,
    FixedExpensesDown,
    VariableExpensesDown,
    IncomeUp,
    RemoveShock,
}

impl Perturbation {
    /// Perturbations evaluated for every run, in reporting order.
    pub const PROFILE: [Perturbation; 4] = [
        Perturbation::LiquidityUp,
        Perturbation::FixedExpensesDown,
        Perturbation::VariableExpensesDown,
        Perturbation::IncomeUp,
    ];

    /// The perturbation set for a run; `RemoveShock` only applies when there
    /// is a scenario to remove.
    pub fn applicable(has_scenario: bool) -> Vec<Perturbation> {
        let mut out = Self::PROFILE.to_vec();
        if has_scenario {
            out.push(Perturbation::RemoveShock);
        }
        out
    }

    pub fn label(self) -> &'static str {
        match self {
            Perturbation::LiquidityUp => "liquidity +10%",
            Perturbation::FixedExpensesDown => "fixed_expenses -10%",
            Perturbation::VariableExpensesDown => "variable_expenses -10%",
            Perturbation::IncomeUp => "income +10%",
            Perturbation::RemoveShock => "remove shock",
        }
    }

    fn scaling(self) -> Option<(ProfileField, Decimal)> {
        let up = Decimal::new(110, 2);
        let down = Decimal::new(90, 2);
        match self {
            Perturbation::LiquidityUp => Some((ProfileField::LiquidSavings, up)),
            Perturbation::FixedExpensesDown => Some((ProfileField::FixedExpenses, down)),
            Perturbation::VariableExpensesDown => Some((ProfileField::VariableExpenses, down)),
            Perturbation::IncomeUp => Some((ProfileField::MonthlyIncome, up)),
            Perturbation::RemoveShock => None,
        }
    }

    /// The perturbed profile and scenario. The inputs are left untouched.
    pub fn apply<'a>(
        self,
        profile: &FinancialProfile,
        scenario: Option<&'a Scenario>,
    ) -> (FinancialProfile, Option<&'a Scenario>) {
        match self.scaling() {
            Some((field, factor)) => (profile.scaled(field, factor), scenario),
            None => (profile.clone(), None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
    #[serde(rename = "driver")]
    pub label: String,
    /// Baseline minus perturbed failure probability, rounded to 4 dp.
    /// Positive means the change reduces risk.
    pub delta_p_fail: f64,
}

/// Rank risk drivers by re-running the simulation once per perturbation with
/// the same seed.
///
/// Each run seeds its own generator, so the perturbations are simulated in
/// parallel and collected back in their fixed order. The result is sorted by
/// descending `|delta_p_fail|`; ties keep the perturbation order.
pub fn analyze(
    profile: &FinancialProfile,
    debts: &[Debt],
    scenario: Option<&Scenario>,
    horizon_months: u32,
    n_sims: u32,
    seed: u64,
    overrides: &AssumptionOverrides,
) -> Result<Vec<Driver>, FlowRiskError> {
    let p_fail_base = simulate(profile, debts, scenario, horizon_months, n_sims, seed, overrides)?.p_fail();

    let mut drivers = Perturbation::applicable(scenario.is_some())
        .into_par_iter()
        .map(|perturbation| {
            let (perturbed, scenario) = perturbation.apply(profile, scenario);
            let p_fail =
                simulate(&perturbed, debts, scenario, horizon_months, n_sims, seed, overrides)?.p_fail();
            let delta_p_fail = round_to(p_fail_base - p_fail, 4);
            debug!(driver = perturbation.label(), p_fail, delta_p_fail, "perturbation simulated");
            Ok(Driver { label: perturbation.label().to_string(), delta_p_fail })
        })
        .collect::<Result<Vec<_>, FlowRiskError>>()?;

    drivers.sort_by(|a, b| {
        b.delta_p_fail.abs().partial_cmp(&a.delta_p_fail.abs()).unwrap_or(Ordering::Equal)
    });
    Ok(drivers)
}
