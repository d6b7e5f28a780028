//! Conversion from a finished career to a monthly benefit.
//!
//! Two formulas coexist and give different numbers for the same career:
//! [`AccountBalanceConverter`] annuitises the accumulated balance, while
//! [`DirectConverter`] applies a flat replacement factor scaled by career
//! length. Callers pick one through [`BenefitFormula`].

use super::config::EngineConfig;
use super::non_negative;
use super::types::BenefitFormula;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenefitInputs {
    pub terminal_balance: f64,
    /// Salary the replacement rate is measured against.
    pub final_salary: f64,
    pub reference_salary: f64,
    pub years_worked: u32,
    pub starting_funds: f64,
    /// Fraction removed from the direct formula's base term.
    pub sick_penalty: f64,
    pub life_expectancy_years: f64,
    pub inflation_rate: f64,
    pub years_until_retirement: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenefitFigures {
    pub nominal_monthly: f64,
    pub real_monthly: f64,
    pub replacement_rate: f64,
}

pub trait BenefitConverter {
    fn formula(&self) -> BenefitFormula;

    fn convert(&self, inputs: &BenefitInputs) -> BenefitFigures;
}

#[derive(Debug, Clone, Copy)]
pub struct AccountBalanceConverter {
    pub epsilon: f64,
}

impl BenefitConverter for AccountBalanceConverter {
    fn formula(&self) -> BenefitFormula {
        BenefitFormula::AccountBalance
    }

    fn convert(&self, inputs: &BenefitInputs) -> BenefitFigures {
        let months = inputs.life_expectancy_years * 12.0;
        let nominal = if months > 0.0 {
            finite_or_zero(non_negative(inputs.terminal_balance) / months)
        } else {
            0.0
        };
        figures(nominal, inputs.final_salary, inputs, self.epsilon)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DirectConverter {
    pub salary_factor: f64,
    pub reference_career_years: f64,
    pub max_years_worked: u32,
    pub funds_payout_months: f64,
    pub epsilon: f64,
}

impl DirectConverter {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            salary_factor: config.direct_salary_factor,
            reference_career_years: config.reference_career_years,
            max_years_worked: config.max_years_worked,
            funds_payout_months: config.funds_payout_months,
            epsilon: config.replacement_epsilon,
        }
    }

    pub fn base_term(&self, inputs: &BenefitInputs) -> f64 {
        if self.reference_career_years <= 0.0 {
            return 0.0;
        }
        let years = inputs.years_worked.min(self.max_years_worked) as f64;
        finite_or_zero(
            non_negative(inputs.reference_salary)
                * self.salary_factor
                * (years / self.reference_career_years),
        )
    }
}

impl BenefitConverter for DirectConverter {
    fn formula(&self) -> BenefitFormula {
        BenefitFormula::Direct
    }

    fn convert(&self, inputs: &BenefitInputs) -> BenefitFigures {
        let penalty = inputs.sick_penalty.clamp(0.0, 1.0);
        let funds_monthly = if self.funds_payout_months > 0.0 {
            non_negative(inputs.starting_funds) / self.funds_payout_months
        } else {
            0.0
        };
        let nominal = finite_or_zero(self.base_term(inputs) * (1.0 - penalty) + funds_monthly);
        // No salary path exists here: the reference salary is the final one.
        figures(nominal, inputs.reference_salary, inputs, self.epsilon)
    }
}

pub fn converter_for(formula: BenefitFormula, config: &EngineConfig) -> Box<dyn BenefitConverter> {
    match formula {
        BenefitFormula::AccountBalance => Box::new(AccountBalanceConverter {
            epsilon: config.replacement_epsilon,
        }),
        BenefitFormula::Direct => Box::new(DirectConverter::from_config(config)),
    }
}

pub fn years_until_retirement(end_year: i32, now_year: i32) -> u32 {
    (i64::from(end_year) - i64::from(now_year)).clamp(0, i64::from(u32::MAX)) as u32
}

/// Nominal value expressed in today's money.
pub fn real_value(nominal: f64, inflation_rate: f64, years: u32) -> f64 {
    let deflator = (1.0 + non_negative(inflation_rate)).powi(years.min(i32::MAX as u32) as i32);
    finite_or_zero(nominal / deflator)
}

pub fn replacement_rate(nominal: f64, final_salary: f64, epsilon: f64) -> f64 {
    if !final_salary.is_finite() || final_salary <= 0.0 {
        return 0.0;
    }
    finite_or_zero(nominal / final_salary.max(epsilon))
}

fn figures(nominal: f64, final_salary: f64, inputs: &BenefitInputs, epsilon: f64) -> BenefitFigures {
    BenefitFigures {
        nominal_monthly: nominal,
        real_monthly: real_value(nominal, inputs.inflation_rate, inputs.years_until_retirement),
        replacement_rate: replacement_rate(nominal, final_salary, epsilon),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
