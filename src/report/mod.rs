//! Presentation layer over [`ForecastResult`]: whole-unit amounts, a scenario
//! table for later retirement and a one-line verdict on the expected pension.

pub mod usage;

use serde::{Deserialize, Serialize};

use crate::core::{BenefitFormula, ForecastRequest, ForecastResult, GoalOutcome, EngineConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRow {
    pub extra_years: u32,
    pub projected_benefit: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub formula: BenefitFormula,
    pub years_worked: u32,
    pub nominal_monthly_benefit: f64,
    pub real_monthly_benefit: f64,
    /// Percent with one decimal place.
    pub replacement_rate_percent: f64,
    pub terminal_balance: f64,
    pub total_contributions: f64,
    pub average_pension_benchmark: f64,
    pub scenarios: Vec<ScenarioRow>,
    pub goal: GoalOutcome,
    pub goal_message: String,
}

impl ForecastReport {
    pub fn build(request: &ForecastRequest, result: &ForecastResult, config: &EngineConfig) -> Self {
        let goal = GoalOutcome::assess(
            result.nominal_monthly_benefit,
            request.desired_monthly_benefit,
            config.later_retirement_growth,
        );
        let scenarios = result
            .later_retirement_options
            .iter()
            .map(|option| ScenarioRow {
                extra_years: option.extra_years,
                projected_benefit: round_unit(option.projected_benefit),
                label: format!(
                    "+{} {}: {}",
                    option.extra_years,
                    if option.extra_years == 1 { "year" } else { "years" },
                    format_pln(option.projected_benefit)
                ),
            })
            .collect();

        Self {
            formula: result.formula,
            years_worked: result.years_worked,
            nominal_monthly_benefit: round_unit(result.nominal_monthly_benefit),
            real_monthly_benefit: round_unit(result.real_monthly_benefit),
            replacement_rate_percent: round_unit(result.replacement_rate * 1_000.0) / 10.0,
            terminal_balance: round_unit(result.terminal_balance),
            total_contributions: round_unit(result.total_contributions),
            average_pension_benchmark: round_unit(result.average_pension_benchmark),
            scenarios,
            goal,
            goal_message: goal_message(goal),
        }
    }
}

pub fn goal_message(goal: GoalOutcome) -> String {
    match goal {
        GoalOutcome::NoGoal => "No expected pension given.".to_string(),
        GoalOutcome::AlreadyMet { desired } => {
            format!("The forecast already meets the expected {}.", format_pln(desired))
        }
        GoalOutcome::Reachable {
            desired,
            extra_years,
        } => format!(
            "Working {extra_years} more {} would reach the expected {}.",
            if extra_years == 1 { "year" } else { "years" },
            format_pln(desired)
        ),
        GoalOutcome::Unreachable { desired } => format!(
            "The expected {} cannot be reached by working longer.",
            format_pln(desired)
        ),
    }
}

/// `12 345 PLN`. Negative and non-finite amounts print as zero.
pub fn format_pln(amount: f64) -> String {
    let whole = round_unit(amount).max(0.0) as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped.push_str(" PLN");
    grouped
}

pub(crate) fn round_unit(value: f64) -> f64 {
    if value.is_finite() { value.round() } else { 0.0 }
}
