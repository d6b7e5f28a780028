use tracing::debug;

use super::accumulator::{self, Ledger};
use super::benefit::{BenefitInputs, converter_for, years_until_retirement};
use super::config::EngineConfig;
use super::error::ForecastError;
use super::illness::{self, default_sick_leave_interval};
use super::salary::{self, SalaryAnchor, SalarySources};
use super::solver::{later_retirement_options, solve_years_to_goal};
use super::types::{BenefitFormula, ForecastRequest, ForecastResult, Sex};

const MAX_SPAN_YEARS: i64 = 200;
const MAX_AGE: u32 = 150;

/// Runs the full projection for one request.
///
/// `now_year` drives the inflation discount and must come from the caller so
/// identical inputs always give identical output.
pub fn run_forecast(
    request: &ForecastRequest,
    formula: BenefitFormula,
    config: &EngineConfig,
    now_year: i32,
) -> Result<ForecastResult, ForecastError> {
    validate_request(request)?;

    let ledger = build_ledger(request, config);
    let inputs = benefit_inputs(request, &ledger, config, now_year);
    let figures = converter_for(formula, config).convert(&inputs);

    let growth = config.later_retirement_growth;
    let later_retirement_options =
        later_retirement_options(figures.nominal_monthly, growth, &config.later_retirement_years);
    let years_to_goal =
        solve_years_to_goal(figures.nominal_monthly, request.desired_monthly_benefit, growth);

    debug!(
        age = request.age,
        sex = request.sex.as_str(),
        start_year = request.start_year,
        end_year = request.end_year,
        ?formula,
        nominal = figures.nominal_monthly,
        real = figures.real_monthly,
        ?years_to_goal,
        "forecast computed"
    );

    Ok(ForecastResult {
        formula,
        years_worked: inputs.years_worked,
        terminal_balance: ledger.terminal_balance,
        total_contributions: ledger.total_contributions,
        yearly: ledger.records,
        nominal_monthly_benefit: figures.nominal_monthly,
        real_monthly_benefit: figures.real_monthly,
        replacement_rate: figures.replacement_rate,
        later_retirement_options,
        years_to_goal,
        average_pension_benchmark: average_pension_benchmark(request.monthly_salary, config),
    })
}

/// Salary path, illness adjustment and accumulation, without benefit conversion.
pub fn build_ledger(request: &ForecastRequest, config: &EngineConfig) -> Ledger {
    let path = salary::resolve(
        request.start_year,
        request.end_year,
        SalaryAnchor {
            year: request.salary_reference_year.unwrap_or(request.start_year),
            monthly: request.monthly_salary,
        },
        SalarySources {
            historical: &request.historical_salary_points,
            future: &request.future_salary_overrides,
        },
        request.annual_indexation_rate,
        request.salary_gap_fill,
    );

    let mut intervals = request.illness_intervals.clone();
    if request.include_sick_leave {
        intervals.push(default_sick_leave_interval(
            request.sex,
            request.start_year,
            request.end_year,
            config,
        ));
    }
    let adjusted = illness::adjust(&path, &intervals);

    accumulator::accumulate(
        &adjusted,
        request.starting_funds,
        request.fund_rate(),
        request.contribution_rate.unwrap_or(config.contribution_rate),
    )
}

fn benefit_inputs(
    request: &ForecastRequest,
    ledger: &Ledger,
    config: &EngineConfig,
    now_year: i32,
) -> BenefitInputs {
    let sick_penalty = if request.include_sick_leave {
        config.sick_leave_penalty.get(request.sex)
    } else {
        0.0
    };
    BenefitInputs {
        terminal_balance: ledger.terminal_balance,
        final_salary: ledger.final_adjusted_salary().unwrap_or(0.0),
        reference_salary: request.monthly_salary,
        years_worked: request.span_years(),
        starting_funds: request.starting_funds,
        sick_penalty,
        life_expectancy_years: request
            .life_expectancy_years
            .unwrap_or(config.life_expectancy_years),
        inflation_rate: request.inflation_rate.unwrap_or(config.inflation_rate),
        years_until_retirement: years_until_retirement(request.end_year, now_year),
    }
}

pub fn average_pension_benchmark(monthly_salary: f64, config: &EngineConfig) -> f64 {
    config
        .benchmark_floor
        .max(config.benchmark_salary_share * monthly_salary)
}

/// Default career span for someone `age` years old in `now_year`: from the
/// usual career start age (never before the earliest supported year) to the
/// statutory retirement age for `sex`.
pub fn career_defaults(age: u32, sex: Sex, now_year: i32, config: &EngineConfig) -> (i32, i32) {
    let birth_year = now_year.saturating_sub(age.min(MAX_AGE) as i32);
    let start_year = birth_year
        .saturating_add(config.career_start_age as i32)
        .max(config.earliest_career_start_year);
    let end_year = birth_year.saturating_add(config.statutory_retirement_age.get(sex) as i32);
    (start_year, end_year)
}

pub fn validate_request(request: &ForecastRequest) -> Result<(), ForecastError> {
    if request.age > MAX_AGE {
        return Err(ForecastError::invalid("age", format!("must be <= {MAX_AGE}")));
    }
    if !request.monthly_salary.is_finite() || request.monthly_salary <= 0.0 {
        return Err(ForecastError::invalid("monthlySalary", "must be > 0"));
    }
    if request.start_year >= request.end_year {
        return Err(ForecastError::invalid(
            "endYear",
            format!(
                "must be after startYear ({} >= {})",
                request.start_year, request.end_year
            ),
        ));
    }
    if i64::from(request.end_year) - i64::from(request.start_year) > MAX_SPAN_YEARS {
        return Err(ForecastError::invalid(
            "endYear",
            format!("career span must not exceed {MAX_SPAN_YEARS} years"),
        ));
    }
    if !request.starting_funds.is_finite() || request.starting_funds < 0.0 {
        return Err(ForecastError::invalid("startingFunds", "must be >= 0"));
    }
    if let Some(desired) = request.desired_monthly_benefit {
        if !desired.is_finite() || desired < 0.0 {
            return Err(ForecastError::invalid("desiredMonthlyBenefit", "must be >= 0"));
        }
    }

    check_rate("annualIndexationRate", Some(request.annual_indexation_rate))?;
    check_rate("fundIndexationRate", request.fund_indexation_rate)?;
    check_rate("inflationRate", request.inflation_rate)?;
    if let Some(rate) = request.contribution_rate {
        if !(rate > 0.0 && rate < 1.0) {
            return Err(ForecastError::invalid(
                "contributionRate",
                "must be between 0 and 1 (exclusive)",
            ));
        }
    }
    if let Some(years) = request.life_expectancy_years {
        if !years.is_finite() || years <= 0.0 {
            return Err(ForecastError::invalid("lifeExpectancyYears", "must be > 0"));
        }
    }

    for (field, points) in [
        ("historicalSalaryPoints", &request.historical_salary_points),
        ("futureSalaryOverrides", &request.future_salary_overrides),
    ] {
        if let Some(point) = points
            .iter()
            .find(|p| !p.gross_monthly.is_finite() || p.gross_monthly < 0.0)
        {
            return Err(ForecastError::invalid(
                field,
                format!("salary for {} must be >= 0", point.year),
            ));
        }
    }

    for interval in &request.illness_intervals {
        if interval.end_year < interval.start_year {
            return Err(ForecastError::invalid(
                "illnessIntervals",
                format!(
                    "interval ends ({}) before it starts ({})",
                    interval.end_year, interval.start_year
                ),
            ));
        }
        if !interval.months_per_year_off.is_finite() || interval.months_per_year_off < 0.0 {
            return Err(ForecastError::invalid(
                "illnessIntervals",
                "monthsPerYearOff must be >= 0",
            ));
        }
    }
    Ok(())
}

fn check_rate(field: &'static str, rate: Option<f64>) -> Result<(), ForecastError> {
    match rate {
        Some(r) if !r.is_finite() || r < 0.0 => Err(ForecastError::invalid(field, "must be >= 0")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IllnessInterval, SalaryPoint};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;
    const NOW: i32 = 2025;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn sample_request() -> ForecastRequest {
        ForecastRequest::basic(30, Sex::Male, 6_000.0, 2015, 2050, 0.035)
    }

    fn run(request: &ForecastRequest, formula: BenefitFormula) -> ForecastResult {
        run_forecast(request, formula, &EngineConfig::default(), NOW).expect("valid request")
    }

    #[test]
    fn reference_career_produces_one_record_per_year() {
        let result = run(&sample_request(), BenefitFormula::AccountBalance);
        assert_eq!(result.yearly.len(), 35);
        assert_eq!(result.years_worked, 35);
        assert_eq!(result.yearly.first().map(|r| r.year), Some(2015));
        assert_eq!(result.yearly.last().map(|r| r.year), Some(2049));

        let contributions: f64 = result.yearly.iter().map(|r| r.annual_contribution).sum();
        assert_approx(result.total_contributions, contributions);
        assert!(result.terminal_balance > contributions);
        assert!(result.nominal_monthly_benefit > 0.0);
        assert!(result.real_monthly_benefit < result.nominal_monthly_benefit);
        assert_eq!(result.later_retirement_options.len(), 3);
        assert_eq!(result.years_to_goal, None);
    }

    #[test]
    fn oracle_short_career_matches_hand_calculation() {
        // Salaries 1000, 1100; contribution rate 10% -> 1200, 1320.
        // Balance: 1200, then 1200 * 1.1 + 1320 = 2640.
        // Nominal: 2640 / (10 * 12) = 22; real after 2 years at 10%: 22 / 1.21.
        let mut request = ForecastRequest::basic(40, Sex::Female, 1_000.0, 2025, 2027, 0.10);
        request.contribution_rate = Some(0.10);
        request.life_expectancy_years = Some(10.0);
        request.inflation_rate = Some(0.10);

        let result = run(&request, BenefitFormula::AccountBalance);
        assert_approx(result.yearly[0].cumulative_balance, 1_200.0);
        assert_approx(result.yearly[1].resolved_salary, 1_100.0);
        assert_approx(result.terminal_balance, 2_640.0);
        assert_approx(result.nominal_monthly_benefit, 22.0);
        assert_approx(result.real_monthly_benefit, 22.0 / 1.21);
        assert_approx(result.replacement_rate, 22.0 / 1_100.0);
    }

    #[test]
    fn direct_formula_sick_leave_costs_exactly_the_penalty() {
        let mut plain = sample_request();
        plain.sex = Sex::Female;
        let mut sick = plain.clone();
        sick.include_sick_leave = true;

        let plain = run(&plain, BenefitFormula::Direct);
        let sick = run(&sick, BenefitFormula::Direct);

        assert!(sick.nominal_monthly_benefit < plain.nominal_monthly_benefit);
        assert_approx(sick.nominal_monthly_benefit, plain.nominal_monthly_benefit * 0.97);
        assert_approx(plain.nominal_monthly_benefit, 6_000.0 * 0.4);
        assert_approx(plain.replacement_rate, 0.4);
    }

    #[test]
    fn sick_leave_lowers_account_balance_through_default_absence() {
        let mut sick = sample_request();
        sick.include_sick_leave = true;
        let plain = run(&sample_request(), BenefitFormula::AccountBalance);
        let sick = run(&sick, BenefitFormula::AccountBalance);

        // 12 days ~ 0.4 months off every year.
        assert_approx(sick.yearly[0].illness_months, 0.4);
        assert_approx(sick.terminal_balance, plain.terminal_balance * (11.6 / 12.0));
    }

    #[test]
    fn fund_indexation_can_differ_from_wage_growth() {
        let mut request = sample_request();
        request.fund_indexation_rate = Some(0.0);
        let result = run(&request, BenefitFormula::AccountBalance);
        assert_approx(result.terminal_balance, result.total_contributions);
        assert!(result.yearly[1].resolved_salary > result.yearly[0].resolved_salary);
    }

    #[test]
    fn desired_benefit_drives_years_to_goal() {
        let mut request = sample_request();
        let nominal = run(&request, BenefitFormula::Direct).nominal_monthly_benefit;

        request.desired_monthly_benefit = Some(nominal * 2.0);
        assert_eq!(run(&request, BenefitFormula::Direct).years_to_goal, Some(10));

        request.desired_monthly_benefit = Some(nominal / 2.0);
        assert_eq!(run(&request, BenefitFormula::Direct).years_to_goal, Some(0));
    }

    #[test]
    fn overrides_and_illness_flow_into_the_ledger() {
        let mut request = ForecastRequest::basic(35, Sex::Male, 5_000.0, 2020, 2024, 0.0);
        request.historical_salary_points = vec![SalaryPoint::new(2021, 7_000.0)];
        request.future_salary_overrides = vec![SalaryPoint::new(2023, 9_000.0)];
        request.illness_intervals = vec![IllnessInterval::new(2023, 2023, 6.0)];

        let result = run(&request, BenefitFormula::AccountBalance);
        let salaries: Vec<f64> = result.yearly.iter().map(|r| r.resolved_salary).collect();
        assert_eq!(salaries, vec![5_000.0, 7_000.0, 7_000.0, 9_000.0]);
        assert_approx(result.yearly[3].illness_adjusted_salary, 4_500.0);
        assert_approx(result.replacement_rate, result.nominal_monthly_benefit / 4_500.0);
    }

    #[test]
    fn benchmark_uses_floor_or_salary_share() {
        let config = EngineConfig::default();
        assert_approx(average_pension_benchmark(3_000.0, &config), 2_500.0);
        assert_approx(average_pension_benchmark(10_000.0, &config), 4_500.0);
    }

    #[test]
    fn career_defaults_follow_statutory_age() {
        let config = EngineConfig::default();
        assert_eq!(career_defaults(30, Sex::Male, 2025, &config), (2013, 2060));
        assert_eq!(career_defaults(30, Sex::Female, 2025, &config), (2013, 2055));
        assert_eq!(career_defaults(60, Sex::Male, 2025, &config), (1983, 2030));
        assert_eq!(career_defaults(70, Sex::Male, 2025, &config), (1980, 2020));
    }

    #[test]
    fn validation_rejects_bad_requests() {
        let cases: [(&str, fn(&mut ForecastRequest)); 12] = [
            ("age", |r: &mut ForecastRequest| r.age = 151),
            ("endYear", |r: &mut ForecastRequest| r.end_year = r.start_year + 201),
            ("monthlySalary", |r: &mut ForecastRequest| r.monthly_salary = 0.0),
            ("endYear", |r: &mut ForecastRequest| r.end_year = r.start_year),
            ("startingFunds", |r: &mut ForecastRequest| r.starting_funds = -1.0),
            ("annualIndexationRate", |r: &mut ForecastRequest| {
                r.annual_indexation_rate = -0.01
            }),
            ("fundIndexationRate", |r: &mut ForecastRequest| {
                r.fund_indexation_rate = Some(f64::NAN)
            }),
            ("contributionRate", |r: &mut ForecastRequest| {
                r.contribution_rate = Some(1.0)
            }),
            ("lifeExpectancyYears", |r: &mut ForecastRequest| {
                r.life_expectancy_years = Some(0.0)
            }),
            ("desiredMonthlyBenefit", |r: &mut ForecastRequest| {
                r.desired_monthly_benefit = Some(-10.0)
            }),
            ("illnessIntervals", |r: &mut ForecastRequest| {
                r.illness_intervals = vec![IllnessInterval::new(2030, 2029, 1.0)]
            }),
            ("historicalSalaryPoints", |r: &mut ForecastRequest| {
                r.historical_salary_points = vec![SalaryPoint::new(2020, -1.0)]
            }),
        ];

        for (field, mutate) in cases {
            let mut request = sample_request();
            mutate(&mut request);
            let err = run_forecast(
                &request,
                BenefitFormula::AccountBalance,
                &EngineConfig::default(),
                NOW,
            )
            .expect_err("must reject");
            assert!(
                err.to_string().contains(field),
                "expected error about {field}, got {err}"
            );
        }
    }

    #[test]
    fn span_and_age_limits_are_inclusive() {
        let mut request = sample_request();
        request.age = 150;
        request.end_year = request.start_year + 200;
        let result = run(&request, BenefitFormula::AccountBalance);
        assert_eq!(result.yearly.len(), 200);
    }

    #[test]
    fn extreme_salary_point_years_do_not_panic() {
        let mut request = sample_request();
        request.salary_gap_fill = crate::core::types::GapFill::Interpolate;
        request.historical_salary_points = vec![SalaryPoint::new(i32::MIN, 1_000.0)];
        request.future_salary_overrides = vec![SalaryPoint::new(i32::MAX, 2_000.0)];
        let result = run(&request, BenefitFormula::AccountBalance);
        assert!(result.nominal_monthly_benefit.is_finite());
        assert!(result.yearly.iter().all(|r| r.resolved_salary.is_finite()));
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let mut request = sample_request();
        request.desired_monthly_benefit = Some(9_000.0);
        request.illness_intervals = vec![IllnessInterval::new(2030, 2032, 3.0)];
        let first = run(&request, BenefitFormula::AccountBalance);
        let second = run(&request, BenefitFormula::AccountBalance);
        assert_eq!(first, second);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_results_are_finite_and_consistent(
            age in 18u32..70,
            salary in 1u32..40_000,
            start in 1980i32..2040,
            span in 1i32..60,
            funds in 0u32..1_000_000,
            wage_bp in 0u32..1_000,
            fund_bp in 0u32..1_000,
            desired in proptest::option::of(0u32..50_000),
            sick in proptest::bool::ANY,
            female in proptest::bool::ANY,
            illness in proptest::collection::vec((0i32..60, 0i32..5, 0u32..13), 0..4),
        ) {
            let sex = if female { Sex::Female } else { Sex::Male };
            let mut request = ForecastRequest::basic(
                age, sex, salary as f64, start, start + span, wage_bp as f64 / 10_000.0,
            );
            request.starting_funds = funds as f64;
            request.fund_indexation_rate = Some(fund_bp as f64 / 10_000.0);
            request.desired_monthly_benefit = desired.map(|d| d as f64);
            request.include_sick_leave = sick;
            request.illness_intervals = illness
                .iter()
                .map(|&(off, len, months)| IllnessInterval::new(start + off, start + off + len, months as f64))
                .collect();

            for formula in [BenefitFormula::AccountBalance, BenefitFormula::Direct] {
                let result = run(&request, formula);
                prop_assert_eq!(result.yearly.len(), span as usize);
                prop_assert!(result.nominal_monthly_benefit.is_finite());
                prop_assert!(result.real_monthly_benefit.is_finite());
                prop_assert!(result.replacement_rate.is_finite());
                prop_assert!(result.nominal_monthly_benefit >= 0.0);

                let mut prev = request.starting_funds;
                for record in &result.yearly {
                    prop_assert!(record.illness_adjusted_salary >= 0.0);
                    prop_assert!(record.cumulative_balance >= prev);
                    prev = record.cumulative_balance;
                }

                if request.desired_monthly_benefit.is_none() || result.nominal_monthly_benefit <= 0.0 {
                    prop_assert_eq!(result.years_to_goal, None);
                }
            }
        }
    }
}
