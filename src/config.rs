use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::assumptions::AssumptionOverrides;
use crate::error::FlowRiskError;
use crate::profile::{Debt, FinancialProfile};
use crate::scenario::{Scenario, ScenarioKind};

/// How much to simulate. `seed: None` asks the run layer to draw one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub horizon_months: u32,
    pub n_sims: u32,
    pub seed: Option<u64>,
}

impl RunConfig {
    pub const MIN_HORIZON: u32 = 1;
    pub const MAX_HORIZON: u32 = 24;
    pub const MIN_SIMS: u32 = 100;
    pub const MAX_SIMS: u32 = 5000;

    pub fn canonical() -> Self {
        RunConfig { horizon_months: 12, n_sims: 1000, seed: None }
    }

    pub fn validate(&self) -> Result<(), FlowRiskError> {
        if !(Self::MIN_HORIZON..=Self::MAX_HORIZON).contains(&self.horizon_months) {
            return Err(FlowRiskError::HorizonOutOfRange {
                horizon: self.horizon_months,
                min: Self::MIN_HORIZON,
                max: Self::MAX_HORIZON,
            });
        }
        if !(Self::MIN_SIMS..=Self::MAX_SIMS).contains(&self.n_sims) {
            return Err(FlowRiskError::SimCountOutOfRange {
                n_sims: self.n_sims,
                min: Self::MIN_SIMS,
                max: Self::MAX_SIMS,
            });
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

/// A complete stress-test request: the household, its debts, an optional
/// scenario, the run size and any volatility overrides.
///
/// Only `profile` is required in JSON; everything else defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestConfig {
    pub profile: FinancialProfile,
    #[serde(default)]
    pub debts: Vec<Debt>,
    #[serde(default)]
    pub scenario: Option<Scenario>,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub assumptions: AssumptionOverrides,
}

impl StressTestConfig {
    /// Demo household: modest buffer, a car loan and a card, facing a
    /// four-month job loss from month 3 with 40% income replacement.
    pub fn canonical() -> Self {
        let job_loss = json!({
            "start_month": 3,
            "duration_months": 4,
            "unemployment_replacement_pct": 0.4,
        });
        let scenario = match job_loss {
            serde_json::Value::Object(params) => Scenario::new(ScenarioKind::JobLoss, params).ok(),
            _ => None,
        };

        StressTestConfig {
            profile: FinancialProfile {
                monthly_income: Decimal::new(5200, 0),
                sigma_income: Decimal::new(5, 2),
                fixed_expenses: Decimal::new(2800, 0),
                variable_expenses: Decimal::new(1100, 0),
                sigma_variable: Decimal::new(10, 2),
                liquid_savings: Decimal::new(9000, 0),
            },
            debts: vec![
                Debt {
                    name: "car loan".to_string(),
                    balance: Decimal::new(14_500, 0),
                    apr: Decimal::new(499, 4),
                    min_payment: Decimal::new(350, 0),
                },
                Debt {
                    name: "credit card".to_string(),
                    balance: Decimal::new(3_200, 0),
                    apr: Decimal::new(2199, 4),
                    min_payment: Decimal::new(120, 0),
                },
            ],
            scenario,
            run: RunConfig::canonical(),
            assumptions: AssumptionOverrides::default(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, FlowRiskError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FlowRiskError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }
}
