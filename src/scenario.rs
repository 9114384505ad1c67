use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowRiskError;
use crate::types::Month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Baseline,
    Decision,
    JobLoss,
    ExpenseShock,
    RateShock,
    RentIncrease,
}

impl ScenarioKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioKind::Baseline => "baseline",
            ScenarioKind::Decision => "decision",
            ScenarioKind::JobLoss => "job_loss",
            ScenarioKind::ExpenseShock => "expense_shock",
            ScenarioKind::RateShock => "rate_shock",
            ScenarioKind::RentIncrease => "rent_increase",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = FlowRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(ScenarioKind::Baseline),
            "decision" => Ok(ScenarioKind::Decision),
            "job_loss" => Ok(ScenarioKind::JobLoss),
            "expense_shock" => Ok(ScenarioKind::ExpenseShock),
            "rate_shock" => Ok(ScenarioKind::RateShock),
            "rent_increase" => Ok(ScenarioKind::RentIncrease),
            other => Err(FlowRiskError::UnknownScenarioKind(other.to_string())),
        }
    }
}

/// Resolved, typed shock parameters. Month bounds stay signed: they are
/// user-supplied and a window starting at or below zero is legal (it simply
/// clips against month 1).
#[derive(Debug, Clone, PartialEq)]
pub enum Shock {
    None,
    JobLoss { start_month: i64, duration_months: i64, replacement_pct: f64 },
    RentIncrease { start_month: i64, rent_delta: f64 },
    RateShock { min_payment_increase: f64 },
    Decision { one_time_cost: f64, extra_monthly_payment: f64 },
    ExpenseShock { shock_month: i64, shock_amount: f64, shock_duration: i64 },
}

/// One month's deterministic cash-flow components before stochastic draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthFlows {
    pub income: f64,
    pub fixed: f64,
    pub variable: f64,
    pub debt_min: f64,
}

impl Shock {
    fn resolve(kind: ScenarioKind, params: &Map<String, Value>) -> Result<Self, FlowRiskError> {
        let p = Params(params);
        Ok(match kind {
            ScenarioKind::Baseline => Shock::None,
            ScenarioKind::JobLoss => Shock::JobLoss {
                start_month: p.int("start_month", 1)?,
                duration_months: p.int("duration_months", 3)?,
                replacement_pct: p.float("unemployment_replacement_pct", 0.0)?,
            },
            ScenarioKind::RentIncrease => Shock::RentIncrease {
                start_month: p.int("start_month", 1)?,
                rent_delta: p.float("rent_delta", 0.0)?,
            },
            ScenarioKind::RateShock => Shock::RateShock {
                min_payment_increase: p.float("min_payment_increase", 0.0)?,
            },
            ScenarioKind::Decision => Shock::Decision {
                one_time_cost: p.float("one_time_cost", 0.0)?,
                extra_monthly_payment: p.float("extra_monthly_payment", 0.0)?,
            },
            ScenarioKind::ExpenseShock => Shock::ExpenseShock {
                shock_month: p.int("shock_month", 1)?,
                shock_amount: p.float("shock_amount", 0.0)?,
                shock_duration: p.int("shock_duration", 1)?,
            },
        })
    }

    /// Apply this shock's adjustment for `month` to the base flows.
    pub fn apply(&self, month: Month, flows: &mut MonthFlows) {
        match *self {
            Shock::None => {}
            Shock::JobLoss { start_month, duration_months, replacement_pct } => {
                if month.in_window(start_month, duration_months) {
                    flows.income *= replacement_pct;
                }
            }
            Shock::RentIncrease { start_month, rent_delta } => {
                if month.on_or_after(start_month) {
                    flows.fixed += rent_delta;
                }
            }
            Shock::RateShock { min_payment_increase } => {
                flows.debt_min += min_payment_increase;
            }
            Shock::Decision { one_time_cost, extra_monthly_payment } => {
                // Non-positive amounts are ignored, not subtracted.
                if month == Month::FIRST && one_time_cost > 0.0 {
                    flows.fixed += one_time_cost;
                }
                if extra_monthly_payment > 0.0 {
                    flows.debt_min += extra_monthly_payment;
                }
            }
            Shock::ExpenseShock { shock_month, shock_amount, shock_duration } => {
                if month.in_window(shock_month, shock_duration) {
                    if shock_duration > 1 {
                        flows.fixed += shock_amount / shock_duration as f64;
                    } else {
                        flows.fixed += shock_amount;
                    }
                }
            }
        }
    }
}

/// Wire form of a scenario: a type tag plus a free-form parameter object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "parameters")]
    pub parameters_json: Map<String, Value>,
}

/// A deterministic shock applied on top of the stochastic baseline.
///
/// Parameters are validated once at construction; unrecognized keys are kept
/// for round-tripping but never read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScenarioRecord", into = "ScenarioRecord")]
pub struct Scenario {
    kind: ScenarioKind,
    parameters: Map<String, Value>,
    shock: Shock,
}

impl Scenario {
    pub fn new(kind: ScenarioKind, parameters: Map<String, Value>) -> Result<Self, FlowRiskError> {
        let shock = Shock::resolve(kind, &parameters)?;
        Ok(Scenario { kind, parameters, shock })
    }

    /// Build from a kind with no parameters, so every default applies.
    pub fn with_defaults(kind: ScenarioKind) -> Self {
        // An empty map cannot fail parameter parsing.
        let shock = Shock::resolve(kind, &Map::new()).unwrap_or(Shock::None);
        Scenario { kind, parameters: Map::new(), shock }
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn shock(&self) -> &Shock {
        &self.shock
    }

    pub fn apply(&self, month: Month, flows: &mut MonthFlows) {
        self.shock.apply(month, flows);
    }
}

impl TryFrom<ScenarioRecord> for Scenario {
    type Error = FlowRiskError;

    fn try_from(record: ScenarioRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.parse()?;
        Scenario::new(kind, record.parameters_json)
    }
}

impl From<Scenario> for ScenarioRecord {
    fn from(s: Scenario) -> Self {
        ScenarioRecord { kind: s.kind.as_str().to_string(), parameters_json: s.parameters }
    }
}

struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    fn float(&self, key: &str, default: f64) -> Result<f64, FlowRiskError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => number(key, v),
        }
    }

    /// JSON numbers truncate toward zero, so `2.9` months is month 2. Strings
    /// must spell a whole number: `"2"` is accepted, `"2.9"` is not.
    fn int(&self, key: &str, default: i64) -> Result<i64, FlowRiskError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(Value::Number(n)) if n.is_i64() => Ok(n.as_i64().unwrap_or(default)),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| FlowRiskError::InvalidParameter {
                key: key.to_string(),
                reason: "expected an integer",
            }),
            Some(v) => Ok(number(key, v)?.trunc() as i64),
        }
    }
}

fn number(key: &str, value: &Value) -> Result<f64, FlowRiskError> {
    let invalid = |reason| FlowRiskError::InvalidParameter { key: key.to_string(), reason };
    let x = match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid("number out of range"))?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid("expected a number"))?,
        _ => return Err(invalid("expected a number")),
    };
    if x.is_finite() { Ok(x) } else { Err(invalid("must be finite")) }
}
