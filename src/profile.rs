use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A household's monthly cash-flow position. All amounts are fixed-point
/// decimals as stored; the simulator coerces them to `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialProfile {
    pub monthly_income: Decimal,
    /// Fractional standard deviation of monthly income (0.05 = 5%).
    #[serde(default = "default_sigma_income")]
    pub sigma_income: Decimal,
    pub fixed_expenses: Decimal,
    pub variable_expenses: Decimal,
    /// Fractional standard deviation of variable expenses.
    #[serde(default = "default_sigma_variable")]
    pub sigma_variable: Decimal,
    /// Starting cash.
    pub liquid_savings: Decimal,
}

fn default_sigma_income() -> Decimal {
    Decimal::new(5, 2)
}

fn default_sigma_variable() -> Decimal {
    Decimal::new(10, 2)
}

/// The profile fields a sensitivity perturbation may rescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    MonthlyIncome,
    FixedExpenses,
    VariableExpenses,
    LiquidSavings,
}

impl FinancialProfile {
    /// Copy of this profile with one field multiplied by `factor`.
    pub fn scaled(&self, field: ProfileField, factor: Decimal) -> FinancialProfile {
        let mut out = self.clone();
        let slot = match field {
            ProfileField::MonthlyIncome => &mut out.monthly_income,
            ProfileField::FixedExpenses => &mut out.fixed_expenses,
            ProfileField::VariableExpenses => &mut out.variable_expenses,
            ProfileField::LiquidSavings => &mut out.liquid_savings,
        };
        *slot *= factor;
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub name: String,
    pub balance: Decimal,
    /// Annual rate as a decimal fraction (0.0499 = 4.99%). Carried, not
    /// consumed: no interest accrues in the monthly model.
    pub apr: Decimal,
    pub min_payment: Decimal,
}

impl Debt {
    /// Combined minimum monthly payment across all debts.
    pub fn total_min_payment(debts: &[Debt]) -> f64 {
        debts.iter().map(|d| to_f64(d.min_payment)).sum()
    }
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
