use serde::{Deserialize, Serialize};

use super::types::LaterRetirementOption;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum GoalOutcome {
    NoGoal,
    AlreadyMet { desired: f64 },
    Reachable { desired: f64, extra_years: u32 },
    Unreachable { desired: f64 },
}

impl GoalOutcome {
    pub fn assess(current: f64, desired: Option<f64>, per_year_growth: f64) -> Self {
        let Some(desired) = desired else {
            return GoalOutcome::NoGoal;
        };
        match solve_years_to_goal(current, Some(desired), per_year_growth) {
            Some(0) => GoalOutcome::AlreadyMet { desired },
            Some(extra_years) => GoalOutcome::Reachable {
                desired,
                extra_years,
            },
            None => GoalOutcome::Unreachable { desired },
        }
    }

    pub fn years_to_goal(self) -> Option<u32> {
        match self {
            GoalOutcome::AlreadyMet { .. } => Some(0),
            GoalOutcome::Reachable { extra_years, .. } => Some(extra_years),
            GoalOutcome::NoGoal | GoalOutcome::Unreachable { .. } => None,
        }
    }
}

/// Smallest `n` with `current * per_year_growth^n >= desired`.
///
/// `None` when there is no goal, no positive current benefit, or no growth to
/// close the gap with.
pub fn solve_years_to_goal(current: f64, desired: Option<f64>, per_year_growth: f64) -> Option<u32> {
    let desired = desired?;
    if !current.is_finite() || !desired.is_finite() || current <= 0.0 {
        return None;
    }
    if current >= desired {
        return Some(0);
    }
    if !per_year_growth.is_finite() || per_year_growth <= 1.0 {
        return None;
    }

    let ratio = desired / current;
    if !ratio.is_finite() || ratio <= 0.0 {
        return None;
    }
    let years = (ratio.ln() / per_year_growth.ln()).ceil();
    if !years.is_finite() || years < 0.0 || years > u32::MAX as f64 {
        return None;
    }
    Some(years as u32)
}

/// Benefit after working `extra_years` longer, assuming a flat per-year boost
/// instead of re-running the accumulator.
pub fn later_retirement_options(
    current: f64,
    per_year_growth: f64,
    extra_years: &[u32],
) -> Vec<LaterRetirementOption> {
    let growth = if per_year_growth.is_finite() && per_year_growth > 0.0 {
        per_year_growth
    } else {
        1.0
    };
    extra_years
        .iter()
        .map(|&years| {
            let projected = current * growth.powi(years.min(i32::MAX as u32) as i32);
            LaterRetirementOption {
                extra_years: years,
                projected_benefit: if projected.is_finite() { projected } else { 0.0 },
            }
        })
        .collect()
}
