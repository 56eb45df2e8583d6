//! Order-independent category aggregation.
//!
//! Floating-point addition is not associative, so summing in input order would
//! let the storage layer's row order leak into the reported totals. Addends
//! are sorted with `f64::total_cmp` first and then summed with Neumaier
//! compensation, which makes the result a function of the multiset alone.
//! Totals that leave the f64 range saturate at `f64::MAX` rather than
//! reaching the payload as `inf` or `NaN`.

use super::calculator::EmissionBreakdown;

/// Sum a multiset of values independent of their order.
pub fn stable_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().collect();
    sorted.sort_by(f64::total_cmp);

    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for v in sorted {
        let t = sum + v;
        // Past overflow the compensation term is inf - inf.
        if !t.is_finite() {
            return t;
        }
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// Clamp into the finite range. NaN maps to 0.
pub fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-f64::MAX, f64::MAX)
    }
}

/// [`stable_sum`] clamped into the finite range.
pub fn saturating_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    saturate(stable_sum(values))
}

/// Category-wise totals across all per-record breakdowns.
pub fn aggregate(breakdowns: &[EmissionBreakdown]) -> EmissionBreakdown {
    EmissionBreakdown {
        excavation: saturating_sum(breakdowns.iter().map(|b| b.excavation)),
        transportation: saturating_sum(breakdowns.iter().map(|b| b.transportation)),
        equipment: saturating_sum(breakdowns.iter().map(|b| b.equipment)),
        methane: saturating_sum(breakdowns.iter().map(|b| b.methane)),
    }
}
