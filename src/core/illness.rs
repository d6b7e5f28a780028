use super::config::EngineConfig;
use super::non_negative;
use super::salary::SalaryPath;
use super::types::{IllnessInterval, Sex};

const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedYear {
    pub year: i32,
    pub resolved_salary: f64,
    pub illness_months: f64,
    pub adjusted_salary: f64,
}

/// Months unavailable in `year`, summed across every covering interval and
/// clamped to a full year.
pub fn months_off(year: i32, intervals: &[IllnessInterval]) -> f64 {
    intervals
        .iter()
        .filter(|interval| interval.covers(year))
        .map(|interval| non_negative(interval.months_per_year_off))
        .sum::<f64>()
        .clamp(0.0, MONTHS_PER_YEAR)
}

pub fn adjust(path: &SalaryPath, intervals: &[IllnessInterval]) -> Vec<AdjustedYear> {
    path.iter()
        .map(|(year, salary)| {
            let months = months_off(year, intervals);
            AdjustedYear {
                year,
                resolved_salary: salary,
                illness_months: months,
                adjusted_salary: salary * (MONTHS_PER_YEAR - months) / MONTHS_PER_YEAR,
            }
        })
        .collect()
}

/// Average sick leave for `sex`, spread over the whole career.
pub fn default_sick_leave_interval(
    sex: Sex,
    start_year: i32,
    end_year: i32,
    config: &EngineConfig,
) -> IllnessInterval {
    IllnessInterval::new(
        start_year,
        end_year - 1,
        config.sick_leave_months_per_year(sex),
    )
}
