//! Engine assumptions.
//!
//! Every constant the forecast depends on lives here with its default. A JSON
//! document may override any subset of keys; unknown keys are rejected so a
//! typo cannot silently fall back to a default.

use serde::{Deserialize, Serialize};

use super::error::ForecastError;
use super::types::Sex;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BySex<T> {
    pub male: T,
    pub female: T,
}

impl<T: Copy> BySex<T> {
    pub fn get(&self, sex: Sex) -> T {
        match sex {
            Sex::Male => self.male,
            Sex::Female => self.female,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Share of gross annual salary paid into the account.
    pub contribution_rate: f64,
    pub inflation_rate: f64,
    /// Divisor turning a terminal balance into a monthly annuity.
    pub life_expectancy_years: f64,
    /// Assumed benefit multiplier per extra year of work.
    pub later_retirement_growth: f64,
    pub later_retirement_years: Vec<u32>,
    pub direct_salary_factor: f64,
    pub reference_career_years: f64,
    pub max_years_worked: u32,
    /// Months over which accumulated funds are paid out in the direct formula.
    pub funds_payout_months: f64,
    pub sick_leave_penalty: BySex<f64>,
    pub sick_leave_days: BySex<f64>,
    pub days_per_month: f64,
    pub statutory_retirement_age: BySex<u32>,
    pub career_start_age: u32,
    pub earliest_career_start_year: i32,
    pub benchmark_floor: f64,
    pub benchmark_salary_share: f64,
    pub replacement_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            contribution_rate: 0.1952,
            inflation_rate: 0.025,
            life_expectancy_years: 20.0,
            later_retirement_growth: 1.08,
            later_retirement_years: vec![1, 2, 5],
            direct_salary_factor: 0.4,
            reference_career_years: 35.0,
            max_years_worked: 60,
            funds_payout_months: 240.0,
            sick_leave_penalty: BySex {
                male: 0.02,
                female: 0.03,
            },
            sick_leave_days: BySex {
                male: 12.0,
                female: 18.0,
            },
            days_per_month: 30.0,
            statutory_retirement_age: BySex {
                male: 65,
                female: 60,
            },
            career_start_age: 18,
            earliest_career_start_year: 1980,
            benchmark_floor: 2_500.0,
            benchmark_salary_share: 0.45,
            replacement_epsilon: 1e-9,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ForecastError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.contribution_rate > 0.0 && self.contribution_rate < 1.0) {
            return Err(ForecastError::invalid(
                "contributionRate",
                "must be between 0 and 1 (exclusive)",
            ));
        }
        for (field, value) in [
            ("inflationRate", self.inflation_rate),
            ("directSalaryFactor", self.direct_salary_factor),
            ("benchmarkFloor", self.benchmark_floor),
            ("benchmarkSalaryShare", self.benchmark_salary_share),
            ("sickLeavePenalty.male", self.sick_leave_penalty.male),
            ("sickLeavePenalty.female", self.sick_leave_penalty.female),
            ("sickLeaveDays.male", self.sick_leave_days.male),
            ("sickLeaveDays.female", self.sick_leave_days.female),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ForecastError::invalid(field, "must be finite and >= 0"));
            }
        }
        for (field, value) in [
            ("lifeExpectancyYears", self.life_expectancy_years),
            ("referenceCareerYears", self.reference_career_years),
            ("fundsPayoutMonths", self.funds_payout_months),
            ("daysPerMonth", self.days_per_month),
            ("replacementEpsilon", self.replacement_epsilon),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ForecastError::invalid(field, "must be finite and > 0"));
            }
        }
        if !self.later_retirement_growth.is_finite() || self.later_retirement_growth <= 0.0 {
            return Err(ForecastError::invalid(
                "laterRetirementGrowth",
                "must be finite and > 0",
            ));
        }
        Ok(())
    }

    pub fn sick_leave_months_per_year(&self, sex: Sex) -> f64 {
        (self.sick_leave_days.get(sex) / self.days_per_month).clamp(0.0, 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default()
            .validate()
            .expect("defaults must validate");
    }

    #[test]
    fn partial_json_overrides_keep_other_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "inflationRate": 0.04, "sickLeavePenalty": { "male": 0.01, "female": 0.05 } }"#,
        )
        .expect("valid overrides");
        assert_eq!(config.inflation_rate, 0.04);
        assert_eq!(config.sick_leave_penalty.get(Sex::Female), 0.05);
        assert_eq!(config.contribution_rate, 0.1952);
        assert_eq!(config.later_retirement_years, vec![1, 2, 5]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "inflation": 0.04 }"#)
            .expect_err("unknown key must fail");
        assert!(err.to_string().contains("inflation"));
    }

    #[test]
    fn out_of_range_contribution_rate_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "contributionRate": 1.5 }"#)
            .expect_err("rate above 1 must fail");
        assert!(err.to_string().contains("contributionRate"));
    }

    #[test]
    fn sick_leave_days_convert_to_months() {
        let config = EngineConfig::default();
        assert!((config.sick_leave_months_per_year(Sex::Male) - 0.4).abs() < 1e-12);
        assert!((config.sick_leave_months_per_year(Sex::Female) - 0.6).abs() < 1e-12);
    }
}
