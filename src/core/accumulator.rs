use super::illness::AdjustedYear;
use super::non_negative;
use super::types::YearRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub records: Vec<YearRecord>,
    pub terminal_balance: f64,
    pub total_contributions: f64,
}

impl Ledger {
    pub fn final_adjusted_salary(&self) -> Option<f64> {
        self.records.last().map(|r| r.illness_adjusted_salary)
    }
}

/// Walks the adjusted salaries in order. Each year the previous balance is
/// indexed first and that year's contribution is added afterwards.
pub fn accumulate(
    adjusted: &[AdjustedYear],
    starting_funds: f64,
    indexation_rate: f64,
    contribution_rate: f64,
) -> Ledger {
    let growth = 1.0 + non_negative(indexation_rate);
    let rate = non_negative(contribution_rate);

    let mut balance = non_negative(starting_funds);
    let mut total_contributions = 0.0;
    let mut records = Vec::with_capacity(adjusted.len());

    for year in adjusted {
        let annual_contribution = annual_contribution(year.adjusted_salary, rate);
        balance = balance * growth + annual_contribution;
        total_contributions += annual_contribution;

        records.push(YearRecord {
            year: year.year,
            resolved_salary: year.resolved_salary,
            illness_months: year.illness_months,
            illness_adjusted_salary: year.adjusted_salary,
            annual_contribution,
            cumulative_balance: balance,
        });
    }

    Ledger {
        records,
        terminal_balance: balance,
        total_contributions,
    }
}

fn annual_contribution(monthly_salary: f64, rate: f64) -> f64 {
    non_negative(monthly_salary) * 12.0 * rate
}
