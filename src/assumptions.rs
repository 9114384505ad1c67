use serde::{Deserialize, Serialize};

use crate::profile::{FinancialProfile, to_f64};

/// Optional per-run volatility overrides.
///
/// Variable-expense volatility is accepted under two keys: `sigma_variable`
/// and the older `sigma_var`. When both are present the canonical key wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumptionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_variable: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_var: Option<f64>,
}

/// Volatilities actually used by a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assumptions {
    pub sigma_income: f64,
    pub sigma_variable: f64,
}

impl Assumptions {
    pub fn resolve(profile: &FinancialProfile, overrides: &AssumptionOverrides) -> Self {
        let sigma_income = overrides.sigma_income.unwrap_or_else(|| to_f64(profile.sigma_income));
        let sigma_variable = overrides
            .sigma_variable
            .or(overrides.sigma_var)
            .unwrap_or_else(|| to_f64(profile.sigma_variable));
        Assumptions { sigma_income, sigma_variable }
    }
}

impl From<Assumptions> for AssumptionOverrides {
    /// Pin both volatilities, so a later resolution ignores the profile.
    fn from(a: Assumptions) -> Self {
        AssumptionOverrides {
            sigma_income: Some(a.sigma_income),
            sigma_variable: Some(a.sigma_variable),
            sigma_var: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn profile() -> FinancialProfile {
        FinancialProfile {
            monthly_income: Decimal::new(5000, 0),
            sigma_income: Decimal::new(5, 2),
            fixed_expenses: Decimal::new(3000, 0),
            variable_expenses: Decimal::new(1000, 0),
            sigma_variable: Decimal::new(10, 2),
            liquid_savings: Decimal::new(2000, 0),
        }
    }

    #[test]
    fn no_overrides_falls_back_to_profile() {
        let a = Assumptions::resolve(&profile(), &AssumptionOverrides::default());
        assert_eq!(a, Assumptions { sigma_income: 0.05, sigma_variable: 0.10 });
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let o = AssumptionOverrides { sigma_income: None, sigma_variable: Some(0.2), sigma_var: Some(0.3) };
        assert_eq!(Assumptions::resolve(&profile(), &o).sigma_variable, 0.2);
    }

    #[test]
    fn alias_used_when_canonical_absent() {
        let o = AssumptionOverrides { sigma_income: Some(0.0), sigma_variable: None, sigma_var: Some(0.3) };
        let a = Assumptions::resolve(&profile(), &o);
        assert_eq!(a.sigma_variable, 0.3);
        assert_eq!(a.sigma_income, 0.0);
    }

    #[test]
    fn zero_canonical_value_is_still_an_override() {
        let o = AssumptionOverrides { sigma_income: None, sigma_variable: Some(0.0), sigma_var: Some(0.3) };
        assert_eq!(Assumptions::resolve(&profile(), &o).sigma_variable, 0.0);
    }

    #[test]
    fn deserializes_alias_and_ignores_unknown_keys() {
        let o: AssumptionOverrides =
            serde_json::from_str(r#"{"sigma_var": 0.25, "inflation": 0.03}"#).unwrap();
        assert_eq!(o.sigma_var, Some(0.25));
        assert_eq!(o.sigma_variable, None);
    }

    #[test]
    fn pinned_assumptions_resolve_to_themselves() {
        let a = Assumptions { sigma_income: 0.07, sigma_variable: 0.0 };
        assert_eq!(Assumptions::resolve(&profile(), &a.into()), a);
    }
}
