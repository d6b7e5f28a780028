pub mod accumulator;
pub mod benefit;
pub mod config;
mod engine;
mod error;
pub mod illness;
pub mod salary;
pub mod solver;
mod types;

pub use benefit::{BenefitConverter, BenefitFigures, BenefitInputs};
pub use config::{BySex, EngineConfig};
pub use engine::{average_pension_benchmark, build_ledger, career_defaults, run_forecast, validate_request};
pub use error::ForecastError;
pub use solver::GoalOutcome;
pub use types::{
    BenefitFormula, ForecastRequest, ForecastResult, GapFill, IllnessInterval,
    LaterRetirementOption, SalaryPoint, Sex, YearRecord,
};

/// Clamps negatives and non-finite values to zero.
pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
