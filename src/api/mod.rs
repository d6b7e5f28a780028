use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Datelike, Local, NaiveDateTime};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{DEFAULT_USAGE_LOG_CAPACITY, ServerConfig};
use crate::core::{
    BenefitFormula, EngineConfig, ForecastRequest, ForecastResult, GapFill, IllnessInterval,
    SalaryPoint, Sex, career_defaults, run_forecast,
};
use crate::report::ForecastReport;
use crate::report::usage::{UsageLog, UsageLogEntry, submission_key};

/// Wage growth used when neither the CLI nor the API names one, in percent.
const DEFAULT_INDEXATION_PERCENT: f64 = 3.5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSex {
    Male,
    Female,
}

impl From<CliSex> for Sex {
    fn from(value: CliSex) -> Self {
        match value {
            CliSex::Male => Sex::Male,
            CliSex::Female => Sex::Female,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFormula {
    AccountBalance,
    Direct,
}

impl From<CliFormula> for BenefitFormula {
    fn from(value: CliFormula) -> Self {
        match value {
            CliFormula::AccountBalance => BenefitFormula::AccountBalance,
            CliFormula::Direct => BenefitFormula::Direct,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGapFill {
    Forward,
    Interpolate,
}

impl From<CliGapFill> for GapFill {
    fn from(value: CliGapFill) -> Self {
        match value {
            CliGapFill::Forward => GapFill::Forward,
            CliGapFill::Interpolate => GapFill::Interpolate,
        }
    }
}

impl From<GapFill> for CliGapFill {
    fn from(value: GapFill) -> Self {
        match value {
            GapFill::Forward => CliGapFill::Forward,
            GapFill::Interpolate => CliGapFill::Interpolate,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiSex {
    #[serde(alias = "m", alias = "M", alias = "Male")]
    Male,
    #[serde(alias = "f", alias = "F", alias = "Female")]
    Female,
}

impl From<ApiSex> for CliSex {
    fn from(value: ApiSex) -> Self {
        match value {
            ApiSex::Male => CliSex::Male,
            ApiSex::Female => CliSex::Female,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFormula {
    #[serde(alias = "accountBalance", alias = "account_balance", alias = "account")]
    AccountBalance,
    #[serde(alias = "simple")]
    Direct,
}

impl From<ApiFormula> for CliFormula {
    fn from(value: ApiFormula) -> Self {
        match value {
            ApiFormula::AccountBalance => CliFormula::AccountBalance,
            ApiFormula::Direct => CliFormula::Direct,
        }
    }
}

/// Web form fields. Rates are percentages, as typed by a user.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ForecastPayload {
    age: Option<u32>,
    sex: Option<ApiSex>,
    monthly_salary: Option<f64>,
    salary_reference_year: Option<i32>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    include_sick_leave: Option<bool>,
    starting_funds: Option<f64>,
    desired_monthly_benefit: Option<f64>,

    historical_salary_points: Vec<SalaryPoint>,
    future_salary_overrides: Vec<SalaryPoint>,
    illness_intervals: Vec<IllnessInterval>,

    indexation_rate: Option<f64>,
    fund_indexation_rate: Option<f64>,
    inflation_rate: Option<f64>,
    contribution_rate: Option<f64>,
    life_expectancy_years: Option<f64>,
    gap_fill: Option<GapFill>,

    formula: Option<ApiFormula>,
    now_year: Option<i32>,
    postal_code: Option<String>,
}

/// Inputs of a single forecast, shared by the `forecast` subcommand and the HTTP API.
#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    #[arg(long)]
    pub age: u32,
    #[arg(long, value_enum)]
    pub sex: CliSex,
    #[arg(long, help = "Gross monthly salary")]
    pub monthly_salary: f64,
    #[arg(
        long,
        help = "Year the monthly salary applies to; defaults to the start year"
    )]
    pub salary_reference_year: Option<i32>,
    #[arg(long, help = "First contribution year; derived from age when omitted")]
    pub start_year: Option<i32>,
    #[arg(
        long,
        help = "Retirement year (January, not a contribution year); derived from age and sex when omitted"
    )]
    pub end_year: Option<i32>,
    #[arg(long, default_value_t = false)]
    pub include_sick_leave: bool,
    #[arg(long, default_value_t = 0.0)]
    pub starting_funds: f64,
    #[arg(long, help = "Expected monthly pension")]
    pub desired_monthly_benefit: Option<f64>,
    #[arg(
        long = "salary-point",
        value_parser = parse_salary_point,
        help = "Known past salary as YEAR:AMOUNT, repeatable"
    )]
    pub historical_salary_points: Vec<SalaryPoint>,
    #[arg(
        long = "salary-override",
        value_parser = parse_salary_point,
        help = "Planned future salary as YEAR:AMOUNT, repeatable"
    )]
    pub future_salary_overrides: Vec<SalaryPoint>,
    #[arg(
        long = "illness",
        value_parser = parse_illness_interval,
        help = "Illness period as START:END:MONTHS_PER_YEAR, repeatable"
    )]
    pub illness_intervals: Vec<IllnessInterval>,
    #[arg(
        long,
        default_value_t = DEFAULT_INDEXATION_PERCENT,
        help = "Annual wage growth in percent"
    )]
    pub indexation_rate: f64,
    #[arg(
        long,
        help = "Annual account indexation in percent, defaults to indexation-rate"
    )]
    pub fund_indexation_rate: Option<f64>,
    #[arg(long, help = "Annual inflation in percent")]
    pub inflation_rate: Option<f64>,
    #[arg(long, help = "Contribution rate in percent of gross salary")]
    pub contribution_rate: Option<f64>,
    #[arg(long)]
    pub life_expectancy_years: Option<f64>,
    #[arg(long, value_enum, default_value_t = CliGapFill::Forward)]
    pub gap_fill: CliGapFill,
    #[arg(long, value_enum, default_value_t = CliFormula::AccountBalance)]
    pub formula: CliFormula,
    #[arg(long, help = "Current year; defaults to the system clock")]
    pub now_year: Option<i32>,
    #[arg(long)]
    pub postal_code: Option<String>,
}

#[derive(Debug)]
struct ApiRequest {
    request: ForecastRequest,
    formula: BenefitFormula,
    postal_code: Option<String>,
    now_year: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    pub request: ForecastRequest,
    pub result: ForecastResult,
    pub report: ForecastReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageResponse<'a> {
    total: usize,
    entries: Vec<&'a UsageLogEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub usage: Arc<RwLock<UsageLog>>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_usage_capacity(config, DEFAULT_USAGE_LOG_CAPACITY)
    }

    /// Keeps at most `capacity` usage entries, dropping the oldest first.
    pub fn with_usage_capacity(config: EngineConfig, capacity: usize) -> Self {
        Self {
            config: Arc::new(config),
            usage: Arc::new(RwLock::new(UsageLog::with_capacity(capacity))),
        }
    }
}

fn parse_salary_point(raw: &str) -> Result<SalaryPoint, String> {
    let (year, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected YEAR:AMOUNT, got '{raw}'"))?;
    let year = year
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid year in '{raw}': {e}"))?;
    let amount = amount
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid amount in '{raw}': {e}"))?;
    Ok(SalaryPoint::new(year, amount))
}

fn parse_illness_interval(raw: &str) -> Result<IllnessInterval, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    let [start, end, months] = parts.as_slice() else {
        return Err(format!("expected START:END:MONTHS_PER_YEAR, got '{raw}'"));
    };
    let start = start
        .parse::<i32>()
        .map_err(|e| format!("invalid start year in '{raw}': {e}"))?;
    let end = end
        .parse::<i32>()
        .map_err(|e| format!("invalid end year in '{raw}': {e}"))?;
    let months = months
        .parse::<f64>()
        .map_err(|e| format!("invalid months in '{raw}': {e}"))?;
    Ok(IllnessInterval::new(start, end, months))
}

fn percent(value: f64) -> f64 {
    value / 100.0
}

/// Turns CLI-shaped inputs into an engine request. Missing career years are
/// derived from age, sex and `now_year`.
pub fn build_request(args: &ForecastArgs, config: &EngineConfig, now_year: i32) -> ForecastRequest {
    let sex: Sex = args.sex.into();
    let (default_start, default_end) = career_defaults(args.age, sex, now_year, config);

    ForecastRequest {
        age: args.age,
        sex,
        monthly_salary: args.monthly_salary,
        salary_reference_year: args.salary_reference_year,
        start_year: args.start_year.unwrap_or(default_start),
        end_year: args.end_year.unwrap_or(default_end),
        include_sick_leave: args.include_sick_leave,
        starting_funds: args.starting_funds,
        desired_monthly_benefit: args.desired_monthly_benefit,
        historical_salary_points: args.historical_salary_points.clone(),
        future_salary_overrides: args.future_salary_overrides.clone(),
        illness_intervals: args.illness_intervals.clone(),
        annual_indexation_rate: percent(args.indexation_rate),
        fund_indexation_rate: args.fund_indexation_rate.map(percent),
        inflation_rate: args.inflation_rate.map(percent),
        contribution_rate: args.contribution_rate.map(percent),
        life_expectancy_years: args.life_expectancy_years,
        salary_gap_fill: args.gap_fill.into(),
    }
}

/// Runs one forecast for the CLI and renders the response as pretty JSON.
pub fn forecast_json(args: &ForecastArgs, config: &EngineConfig) -> Result<String, String> {
    let now_year = args.now_year.unwrap_or_else(|| Local::now().year());
    let request = build_request(args, config, now_year);
    let response = compute(&request, args.formula.into(), config, now_year)?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to render response: {e}"))
}

fn compute(
    request: &ForecastRequest,
    formula: BenefitFormula,
    config: &EngineConfig,
    now_year: i32,
) -> Result<ForecastResponse, String> {
    let result = run_forecast(request, formula, config, now_year).map_err(|e| e.to_string())?;
    let report = ForecastReport::build(request, &result, config);
    Ok(ForecastResponse {
        request: request.clone(),
        result,
        report,
    })
}

#[cfg(test)]
fn api_request_from_json(json: &str, config: &EngineConfig) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ForecastPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, config, 2025)
}

fn api_request_from_payload(
    payload: ForecastPayload,
    config: &EngineConfig,
    current_year: i32,
) -> Result<ApiRequest, String> {
    let age = payload.age.ok_or("age is required")?;
    let sex = payload.sex.ok_or("sex is required")?;
    let monthly_salary = payload.monthly_salary.ok_or("monthlySalary is required")?;

    let mut args = default_args_for_api(age, sex.into(), monthly_salary);
    args.salary_reference_year = payload.salary_reference_year;
    args.start_year = payload.start_year;
    args.end_year = payload.end_year;
    if let Some(v) = payload.include_sick_leave {
        args.include_sick_leave = v;
    }
    if let Some(v) = payload.starting_funds {
        args.starting_funds = v;
    }
    args.desired_monthly_benefit = payload.desired_monthly_benefit;
    args.historical_salary_points = payload.historical_salary_points;
    args.future_salary_overrides = payload.future_salary_overrides;
    args.illness_intervals = payload.illness_intervals;
    if let Some(v) = payload.indexation_rate {
        args.indexation_rate = v;
    }
    args.fund_indexation_rate = payload.fund_indexation_rate;
    args.inflation_rate = payload.inflation_rate;
    args.contribution_rate = payload.contribution_rate;
    args.life_expectancy_years = payload.life_expectancy_years;
    if let Some(v) = payload.gap_fill {
        args.gap_fill = v.into();
    }
    if let Some(v) = payload.formula {
        args.formula = v.into();
    }

    let now_year = payload.now_year.unwrap_or(current_year);
    Ok(ApiRequest {
        request: build_request(&args, config, now_year),
        formula: args.formula.into(),
        postal_code: payload.postal_code,
        now_year,
    })
}

fn default_args_for_api(age: u32, sex: CliSex, monthly_salary: f64) -> ForecastArgs {
    ForecastArgs {
        age,
        sex,
        monthly_salary,
        salary_reference_year: None,
        start_year: None,
        end_year: None,
        include_sick_leave: false,
        starting_funds: 0.0,
        desired_monthly_benefit: None,
        historical_salary_points: Vec::new(),
        future_salary_overrides: Vec::new(),
        illness_intervals: Vec::new(),
        indexation_rate: DEFAULT_INDEXATION_PERCENT,
        fund_indexation_rate: None,
        inflation_rate: None,
        contribution_rate: None,
        life_expectancy_years: None,
        gap_fill: CliGapFill::Forward,
        formula: CliFormula::AccountBalance,
        now_year: None,
        postal_code: None,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/forecast",
            get(forecast_get_handler).post(forecast_post_handler),
        )
        .route(
            "/api/usage",
            get(usage_list_handler).delete(usage_clear_handler),
        )
        .route("/api/usage.csv", get(usage_csv_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(server: &ServerConfig, config: EngineConfig) -> std::io::Result<()> {
    let addr = server.bind_addr();
    let app = router(AppState::with_usage_capacity(
        config,
        server.usage_log_capacity,
    ));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "pension forecast API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn forecast_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<ForecastPayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => forecast_handler_impl(state, payload).await,
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

async fn forecast_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<ForecastPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => forecast_handler_impl(state, payload).await,
        Err(rejection) => rejected_payload(rejection.body_text()),
    }
}

fn rejected_payload(msg: String) -> Response {
    warn!(error = %msg, "unreadable forecast payload");
    error_response(StatusCode::BAD_REQUEST, &msg)
}

async fn forecast_handler_impl(state: AppState, payload: ForecastPayload) -> Response {
    let now = Local::now().naive_local();
    let api = match api_request_from_payload(payload, &state.config, now.year()) {
        Ok(api) => api,
        Err(msg) => {
            warn!(error = %msg, "rejected forecast payload");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let response = match compute(&api.request, api.formula, &state.config, api.now_year) {
        Ok(response) => response,
        Err(msg) => {
            warn!(error = %msg, "rejected forecast request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    log_usage(&state, &response, now, api.postal_code).await;
    json_response(StatusCode::OK, response)
}

async fn log_usage(
    state: &AppState,
    response: &ForecastResponse,
    at: NaiveDateTime,
    postal_code: Option<String>,
) {
    let entry = UsageLogEntry::from_forecast(&response.request, &response.result, at, postal_code);
    let key = submission_key(&response.request, &response.result);
    let mut usage = state.usage.write().await;
    if usage.record_if_new(entry, key) {
        info!(entries = usage.len(), "usage log entry recorded");
    }
}

async fn usage_list_handler(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Response {
    let usage = state.usage.read().await;
    let entries = usage.filter(&query.q);
    json_response(
        StatusCode::OK,
        UsageResponse {
            total: usage.len(),
            entries,
        },
    )
}

async fn usage_csv_handler(State(state): State<AppState>) -> Response {
    let csv = match state.usage.read().await.to_csv() {
        Ok(csv) => csv,
        Err(e) => {
            warn!(error = %e, "usage export failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };
    with_cache_control((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"usage-report.csv\"",
            ),
        ],
        csv,
    ))
}

async fn usage_clear_handler(State(state): State<AppState>) -> Response {
    let mut usage = state.usage.write().await;
    let cleared = usage.len();
    usage.clear();
    info!(cleared, "usage log cleared");
    json_response(StatusCode::OK, serde_json::json!({ "cleared": cleared }))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
