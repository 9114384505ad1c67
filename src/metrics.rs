use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::simulation::SimulationResult;

/// Time-to-failure quantiles (months) over failed paths only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeToFail {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinCash {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Share of paths that failed, rounded to 4 dp.
    pub p_fail: f64,
    pub n_failed: usize,
    pub n_sims: usize,
    /// Serialized as `{}` when no path failed.
    #[serde(serialize_with = "empty_object_when_none")]
    pub time_to_fail: Option<TimeToFail>,
    pub min_cash: MinCash,
    /// Mean of all strictly positive monthly debt payments, rounded to 2 dp.
    pub avg_debt_payment: f64,
}

impl Summary {
    /// True when every statistic is a finite number.
    pub fn is_finite(&self) -> bool {
        let ttf = self
            .time_to_fail
            .map(|t| [t.p10, t.p50, t.p90, t.median].iter().all(|v| v.is_finite()))
            .unwrap_or(true);
        ttf && [self.p_fail, self.min_cash.p10, self.min_cash.p50, self.min_cash.p90, self.avg_debt_payment]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Per-month cross-sectional cash quantiles, rounded to 2 dp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub months: Vec<u32>,
    pub cash_p10: Vec<f64>,
    pub cash_p50: Vec<f64>,
    pub cash_p90: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub summary: Summary,
    pub chart: ChartData,
}

/// Spread of a metric across repeated runs (used by multi-seed sweeps).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    pub n: usize,
    pub min: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub max: f64,
}

/// Linear-interpolation quantile at fractional index `p * (n - 1)` of the
/// sorted data. Empty input gives 0.0; `p` is clamped to `[0, 1]`.
pub fn quantile(data: &[f64], p: f64) -> f64 {
    match data.len() {
        0 => return 0.0,
        1 => return data[0],
        _ => {}
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();

    let h = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Round to `places` decimal places using the exact binary value of `value`,
/// so 763.775 (stored just below the midpoint) rounds down. True midpoints
/// such as 0.125 go to the even digit. Values a `Decimal` cannot hold are
/// returned unchanged.
pub(crate) fn round_to(value: f64, places: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Reduce a simulation to its summary statistics and chart series.
pub fn summarize(result: &SimulationResult) -> RiskReport {
    RiskReport { summary: summary(result), chart: chart(result) }
}

fn summary(result: &SimulationResult) -> Summary {
    let failed_months: Vec<f64> =
        result.time_to_fail.iter().flatten().map(|m| f64::from(m.0)).collect();
    let time_to_fail = (!failed_months.is_empty()).then(|| {
        let p50 = quantile(&failed_months, 0.50);
        TimeToFail {
            p10: quantile(&failed_months, 0.10),
            p50,
            p90: quantile(&failed_months, 0.90),
            median: p50,
        }
    });

    let payments: Vec<f64> =
        result.debt_payment_paths.iter().flatten().copied().filter(|&p| p > 0.0).collect();
    let avg_debt_payment = if payments.is_empty() {
        0.0
    } else {
        payments.iter().sum::<f64>() / payments.len() as f64
    };

    Summary {
        p_fail: round_to(result.p_fail(), 4),
        n_failed: result.n_failed(),
        n_sims: result.n_paths(),
        time_to_fail,
        min_cash: MinCash {
            p10: quantile(&result.min_cash, 0.10),
            p50: quantile(&result.min_cash, 0.50),
            p90: quantile(&result.min_cash, 0.90),
        },
        avg_debt_payment: round_to(avg_debt_payment, 2),
    }
}

fn chart(result: &SimulationResult) -> ChartData {
    let horizon = result.meta.horizon_months;
    let months: Vec<u32> = (0..=horizon).collect();
    let mut cash_p10 = Vec::with_capacity(months.len());
    let mut cash_p50 = Vec::with_capacity(months.len());
    let mut cash_p90 = Vec::with_capacity(months.len());

    for &m in &months {
        let column: Vec<f64> =
            result.cash_paths.iter().filter_map(|path| path.get(m as usize).copied()).collect();
        cash_p10.push(round_to(quantile(&column, 0.10), 2));
        cash_p50.push(round_to(quantile(&column, 0.50), 2));
        cash_p90.push(round_to(quantile(&column, 0.90), 2));
    }

    ChartData { months, cash_p10, cash_p50, cash_p90 }
}

/// Distribution of `values` across runs. `None` for empty input.
pub fn spread(values: &[f64]) -> Option<Spread> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(Spread {
        n: values.len(),
        min,
        p10: quantile(values, 0.10),
        p50: quantile(values, 0.50),
        p90: quantile(values, 0.90),
        max,
    })
}

fn empty_object_when_none<S: Serializer>(value: &Option<TimeToFail>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(t) => t.serialize(s),
        None => s.serialize_map(Some(0))?.end(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::*;
    use crate::assumptions::{AssumptionOverrides, Assumptions};
    use crate::profile::FinancialProfile;
    use crate::scenario::{Scenario, ScenarioKind};
    use crate::simulation::{SimulationMeta, simulate};
    use crate::types::Month;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Four hand-made paths over a 2-month horizon; two fail.
    fn handmade() -> SimulationResult {
        SimulationResult {
            cash_paths: vec![
                vec![100.0, 120.0, 140.0],
                vec![100.0, 40.0, 0.0],
                vec![100.0, 0.0, 0.0],
                vec![100.0, 160.0, 220.0],
            ],
            failed: vec![false, true, true, false],
            time_to_fail: vec![None, Some(Month(2)), Some(Month(1)), None],
            min_cash: vec![100.0, 40.0, 100.0, 100.0],
            debt_payment_paths: vec![
                vec![50.0, 50.0],
                vec![50.0, 0.0],
                vec![0.0, 0.0],
                vec![50.0, 50.0],
            ],
            meta: SimulationMeta {
                horizon_months: 2,
                n_sims: 4,
                seed: 0,
                assumptions_used: Assumptions { sigma_income: 0.0, sigma_variable: 0.0 },
            },
        }
    }

    // ── quantile ─────────────────────────────────────────────────────────────

    #[test]
    fn quantile_edge_cases() {
        assert_eq!(quantile(&[], 0.5), 0.0);
        assert_eq!(quantile(&[5.0], 0.0), 5.0);
        assert_eq!(quantile(&[5.0], 0.9), 5.0);
        assert_eq!(quantile(&[0.0, 10.0], 0.5), 5.0);
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.0), 1.0);
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 1.0), 4.0);
    }

    #[test]
    fn quantile_sorts_unsorted_input() {
        assert_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert!(close(quantile(&[4.0, 1.0, 3.0, 2.0], 0.5), 2.5));
    }

    #[test]
    fn quantile_interpolates_between_neighbours() {
        // idx = 0.9 * 4 = 3.6 → 40 * 0.4 + 50 * 0.6
        assert!(close(quantile(&[10.0, 20.0, 30.0, 40.0, 50.0], 0.9), 46.0));
        // idx = 0.1 * 4 = 0.4 → 10 * 0.6 + 20 * 0.4
        assert!(close(quantile(&[10.0, 20.0, 30.0, 40.0, 50.0], 0.1), 14.0));
    }

    #[test]
    fn quantile_clamps_probability() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0], -0.5), 1.0);
        assert_eq!(quantile(&[1.0, 2.0, 3.0], 1.5), 3.0);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(148.00000000000003, 2), 148.0);
        assert_eq!(round_to(-2.5, 0), -2.0);
    }

    #[test]
    fn round_to_uses_the_stored_binary_value() {
        // 3/160 is stored as 0.018749999..., 763.775 as 763.77499999...
        assert_eq!(round_to(3.0 / 160.0, 4), 0.0187);
        assert_eq!(round_to(763.775, 2), 763.77);
        assert_eq!(round_to(-763.775, 2), -763.77);
    }

    #[test]
    fn round_to_breaks_exact_ties_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn round_to_passes_non_finite_through() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    // ── summary ──────────────────────────────────────────────────────────────

    #[test]
    fn summary_of_handmade_paths() {
        let s = summarize(&handmade()).summary;
        assert_eq!(s.p_fail, 0.5);
        assert_eq!(s.n_failed, 2);
        assert_eq!(s.n_sims, 4);

        let ttf = s.time_to_fail.expect("two paths failed");
        assert!(close(ttf.p10, 1.1));
        assert!(close(ttf.p50, 1.5));
        assert!(close(ttf.p90, 1.9));
        assert_eq!(ttf.median, ttf.p50);

        assert!(close(s.min_cash.p10, 58.0));
        assert!(close(s.min_cash.p50, 100.0));
        assert!(close(s.min_cash.p90, 100.0));

        assert_eq!(s.avg_debt_payment, 50.0);
        assert!(s.is_finite());
    }

    #[test]
    fn no_failures_serializes_empty_time_to_fail() {
        let mut r = handmade();
        r.failed = vec![false; 4];
        r.time_to_fail = vec![None; 4];
        let s = summarize(&r).summary;
        assert_eq!(s.time_to_fail, None);
        assert_eq!(s.p_fail, 0.0);

        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["time_to_fail"], serde_json::json!({}));
        assert_eq!(v["min_cash"]["p50"], serde_json::json!(100.0));
    }

    #[test]
    fn failures_serialize_all_four_time_to_fail_keys() {
        let v = serde_json::to_value(summarize(&handmade()).summary).unwrap();
        let ttf = v["time_to_fail"].as_object().unwrap();
        let mut keys: Vec<&str> = ttf.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["median", "p10", "p50", "p90"]);
    }

    #[test]
    fn empty_result_degrades_to_zeros() {
        let mut r = handmade();
        r.cash_paths.clear();
        r.failed.clear();
        r.time_to_fail.clear();
        r.min_cash.clear();
        r.debt_payment_paths.clear();
        let report = summarize(&r);
        assert_eq!(report.summary.p_fail, 0.0);
        assert_eq!(report.summary.n_sims, 0);
        assert_eq!(report.summary.avg_debt_payment, 0.0);
        assert_eq!(report.chart.months, vec![0, 1, 2]);
        assert_eq!(report.chart.cash_p50, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn avg_debt_payment_ignores_zero_padding() {
        let mut r = handmade();
        r.debt_payment_paths = vec![vec![100.0, 0.0], vec![0.0, 0.0], vec![33.333, 0.0], vec![0.0, 0.0]];
        assert_eq!(summarize(&r).summary.avg_debt_payment, 66.67);
    }

    #[test]
    fn p_fail_of_three_in_one_sixty() {
        let mut r = handmade();
        let n = 160;
        r.cash_paths = vec![vec![100.0, 100.0, 100.0]; n];
        r.failed = (0..n).map(|i| i < 3).collect();
        r.time_to_fail = (0..n).map(|i| (i < 3).then_some(Month(2))).collect();
        r.min_cash = vec![100.0; n];
        r.debt_payment_paths = vec![vec![0.0, 0.0]; n];
        let s = summarize(&r).summary;
        assert_eq!(s.n_failed, 3);
        assert_eq!(s.p_fail, 0.0187);
    }

    // ── chart ────────────────────────────────────────────────────────────────

    #[test]
    fn chart_of_handmade_paths() {
        let c = summarize(&handmade()).chart;
        assert_eq!(c.months, vec![0, 1, 2]);
        assert_eq!(c.cash_p10, vec![100.0, 12.0, 0.0]);
        assert_eq!(c.cash_p50, vec![100.0, 80.0, 70.0]);
        assert_eq!(c.cash_p90, vec![100.0, 148.0, 196.0]);
    }

    #[test]
    fn chart_median_between_cents_rounds_down() {
        let mut r = handmade();
        r.cash_paths = vec![vec![763.77, 763.77, 763.77], vec![763.78, 763.78, 763.78]];
        r.failed = vec![false; 2];
        r.time_to_fail = vec![None; 2];
        r.min_cash = vec![763.77, 763.78];
        r.debt_payment_paths = vec![vec![0.0, 0.0]; 2];
        let c = summarize(&r).chart;
        assert_eq!(c.cash_p50, vec![763.77; 3]);
    }

    // ── spread ───────────────────────────────────────────────────────────────

    #[test]
    fn spread_reports_extremes_and_quantiles() {
        assert_eq!(spread(&[]), None);
        let s = spread(&[0.3, 0.1, 0.2]).unwrap();
        assert_eq!(s.n, 3);
        assert_eq!(s.min, 0.1);
        assert_eq!(s.max, 0.3);
        assert!(close(s.p50, 0.2));
    }

    // ── Properties ───────────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn prop_quantile_stays_within_data_range(
            data in proptest::collection::vec(-1.0e6f64..1.0e6, 1..50),
            p in 0.0f64..=1.0,
        ) {
            let q = quantile(&data, p);
            let lo = data.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(q >= lo - 1e-6 && q <= hi + 1e-6);
        }

        #[test]
        fn prop_chart_quantiles_are_ordered(seed in 0u64..(1 << 31), horizon in 1u32..=24) {
            let profile = FinancialProfile {
                monthly_income: Decimal::new(4200, 0),
                sigma_income: Decimal::new(15, 2),
                fixed_expenses: Decimal::new(2600, 0),
                variable_expenses: Decimal::new(1300, 0),
                sigma_variable: Decimal::new(25, 2),
                liquid_savings: Decimal::new(1500, 0),
            };
            let shock = Scenario::with_defaults(ScenarioKind::JobLoss);
            let r = simulate(&profile, &[], Some(&shock), horizon, 60, seed, &AssumptionOverrides::default())
                .unwrap();
            let c = summarize(&r).chart;
            prop_assert_eq!(c.months.len(), horizon as usize + 1);
            for m in 0..c.months.len() {
                prop_assert!(c.cash_p10[m] <= c.cash_p50[m], "month {}: p10 > p50", m);
                prop_assert!(c.cash_p50[m] <= c.cash_p90[m], "month {}: p50 > p90", m);
            }
        }
    }
}
