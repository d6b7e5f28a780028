use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

/// Which conversion turns a career into a monthly benefit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenefitFormula {
    /// Terminal account balance spread over the life-expectancy divisor.
    AccountBalance,
    /// `salary x factor x (years worked / reference career)`, plus accumulated funds.
    Direct,
}

/// How years without an explicit salary between two known points are filled.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapFill {
    #[default]
    Forward,
    Interpolate,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryPoint {
    pub year: i32,
    pub gross_monthly: f64,
}

impl SalaryPoint {
    pub fn new(year: i32, gross_monthly: f64) -> Self {
        Self {
            year,
            gross_monthly,
        }
    }
}

/// Both ends inclusive.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IllnessInterval {
    pub start_year: i32,
    pub end_year: i32,
    pub months_per_year_off: f64,
}

impl IllnessInterval {
    pub fn new(start_year: i32, end_year: i32, months_per_year_off: f64) -> Self {
        Self {
            start_year,
            end_year,
            months_per_year_off,
        }
    }

    pub fn covers(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    pub age: u32,
    pub sex: Sex,
    pub monthly_salary: f64,
    /// Year `monthly_salary` applies to. Defaults to `start_year`.
    #[serde(default)]
    pub salary_reference_year: Option<i32>,
    pub start_year: i32,
    /// January of the retirement year; not itself a contribution year.
    pub end_year: i32,
    #[serde(default)]
    pub include_sick_leave: bool,
    #[serde(default)]
    pub starting_funds: f64,
    #[serde(default)]
    pub desired_monthly_benefit: Option<f64>,
    #[serde(default)]
    pub historical_salary_points: Vec<SalaryPoint>,
    #[serde(default)]
    pub future_salary_overrides: Vec<SalaryPoint>,
    #[serde(default)]
    pub illness_intervals: Vec<IllnessInterval>,
    /// Wage growth used to extrapolate the salary path.
    pub annual_indexation_rate: f64,
    /// Balance growth; falls back to `annual_indexation_rate`.
    #[serde(default)]
    pub fund_indexation_rate: Option<f64>,
    #[serde(default)]
    pub inflation_rate: Option<f64>,
    #[serde(default)]
    pub contribution_rate: Option<f64>,
    #[serde(default)]
    pub life_expectancy_years: Option<f64>,
    #[serde(default)]
    pub salary_gap_fill: GapFill,
}

impl ForecastRequest {
    /// A request with no overrides, histories or illness periods.
    pub fn basic(
        age: u32,
        sex: Sex,
        monthly_salary: f64,
        start_year: i32,
        end_year: i32,
        annual_indexation_rate: f64,
    ) -> Self {
        Self {
            age,
            sex,
            monthly_salary,
            salary_reference_year: None,
            start_year,
            end_year,
            include_sick_leave: false,
            starting_funds: 0.0,
            desired_monthly_benefit: None,
            historical_salary_points: Vec::new(),
            future_salary_overrides: Vec::new(),
            illness_intervals: Vec::new(),
            annual_indexation_rate,
            fund_indexation_rate: None,
            inflation_rate: None,
            contribution_rate: None,
            life_expectancy_years: None,
            salary_gap_fill: GapFill::Forward,
        }
    }

    pub fn span_years(&self) -> u32 {
        (i64::from(self.end_year) - i64::from(self.start_year)).clamp(0, i64::from(u32::MAX)) as u32
    }

    pub fn fund_rate(&self) -> f64 {
        self.fund_indexation_rate
            .unwrap_or(self.annual_indexation_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: i32,
    pub resolved_salary: f64,
    pub illness_months: f64,
    pub illness_adjusted_salary: f64,
    pub annual_contribution: f64,
    pub cumulative_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaterRetirementOption {
    pub extra_years: u32,
    pub projected_benefit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub formula: BenefitFormula,
    pub yearly: Vec<YearRecord>,
    pub years_worked: u32,
    pub terminal_balance: f64,
    pub total_contributions: f64,
    pub nominal_monthly_benefit: f64,
    pub real_monthly_benefit: f64,
    pub replacement_rate: f64,
    pub later_retirement_options: Vec<LaterRetirementOption>,
    pub years_to_goal: Option<u32>,
    pub average_pension_benchmark: f64,
}
