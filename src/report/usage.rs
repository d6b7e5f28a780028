use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::round_unit;
use crate::core::{ForecastRequest, ForecastResult, Sex};

const CSV_HEADERS: [&str; 11] = [
    "Date of use",
    "Time of use",
    "Expected pension",
    "Age",
    "Sex",
    "Salary amount",
    "Whether periods of illness were included",
    "Amount of funds accumulated",
    "Actual pension",
    "Real (inflation-adjusted) pension",
    "Postal code",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv export produced invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// One calculator use, as shown in the admin report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogEntry {
    pub date: String,
    pub time: String,
    pub expected_pension: Option<f64>,
    pub age: u32,
    pub sex: Sex,
    pub salary_amount: f64,
    pub sick_leave_included: bool,
    pub funds_accumulated: Option<f64>,
    pub actual_pension: f64,
    pub real_pension: f64,
    pub postal_code: Option<String>,
}

impl UsageLogEntry {
    pub fn from_forecast(
        request: &ForecastRequest,
        result: &ForecastResult,
        at: NaiveDateTime,
        postal_code: Option<String>,
    ) -> Self {
        Self {
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            expected_pension: request.desired_monthly_benefit,
            age: request.age,
            sex: request.sex,
            salary_amount: request.monthly_salary,
            sick_leave_included: request.include_sick_leave,
            funds_accumulated: (request.starting_funds > 0.0).then_some(request.starting_funds),
            actual_pension: round_unit(result.nominal_monthly_benefit),
            real_pension: round_unit(result.real_monthly_benefit),
            postal_code: postal_code
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        let haystacks = [
            self.date.clone(),
            self.time.clone(),
            self.age.to_string(),
            self.sex.as_str().to_string(),
            amount(self.salary_amount),
            self.postal_code.clone().unwrap_or_default(),
            self.expected_pension.map(amount).unwrap_or_default(),
        ];
        haystacks
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }

    fn csv_record(&self) -> [String; 11] {
        [
            self.date.clone(),
            self.time.clone(),
            self.expected_pension.map(amount).unwrap_or_default(),
            self.age.to_string(),
            self.sex.as_str().to_string(),
            amount(self.salary_amount),
            if self.sick_leave_included { "Yes" } else { "No" }.to_string(),
            self.funds_accumulated.map(amount).unwrap_or_default(),
            amount(self.actual_pension),
            amount(self.real_pension),
            self.postal_code.clone().unwrap_or_default(),
        ]
    }
}

/// Identifies a submission so that re-sending the same form with the same
/// outcome is logged once.
pub fn submission_key(request: &ForecastRequest, result: &ForecastResult) -> String {
    format!(
        "result|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        request.age,
        request.sex.as_str(),
        request.monthly_salary,
        request.start_year,
        request.end_year,
        u8::from(request.include_sick_leave),
        request.starting_funds,
        request
            .desired_monthly_benefit
            .map(|v| v.to_string())
            .unwrap_or_default(),
        round_unit(result.nominal_monthly_benefit),
        round_unit(result.real_monthly_benefit),
    )
}

#[derive(Debug, Default)]
pub struct UsageLog {
    entries: Vec<UsageLogEntry>,
    last_key: Option<String>,
    capacity: Option<usize>,
}

impl UsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log holding at most `capacity` entries; the oldest go first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn record(&mut self, entry: UsageLogEntry) {
        self.entries.push(entry);
        self.evict_oldest();
    }

    /// Appends `entry` unless `key` equals the key of the previous recorded
    /// submission. Returns whether the entry was stored.
    pub fn record_if_new(&mut self, entry: UsageLogEntry, key: String) -> bool {
        if self.last_key.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.record(entry);
        self.last_key = Some(key);
        true
    }

    fn evict_oldest(&mut self) {
        if let Some(capacity) = self.capacity {
            let excess = self.entries.len().saturating_sub(capacity);
            if excess > 0 {
                self.entries.drain(..excess);
            }
        }
    }

    pub fn entries(&self) -> &[UsageLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring match. A blank query matches everything.
    pub fn filter(&self, query: &str) -> Vec<&UsageLogEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries
            .iter()
            .filter(|entry| entry.matches(&needle))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_key = None;
    }

    pub fn to_csv(&self) -> Result<String, ExportError> {
        write_csv(self.entries.iter())
    }
}

pub fn write_csv<'a, I>(entries: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a UsageLogEntry>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for entry in entries {
        writer.write_record(entry.csv_record())?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn amount(value: f64) -> String {
    format!("{:.0}", round_unit(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BenefitFormula, EngineConfig, run_forecast};
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|d| d.and_hms_opt(hour, minute, 5))
            .expect("valid timestamp")
    }

    fn forecast(request: &ForecastRequest) -> ForecastResult {
        run_forecast(
            request,
            BenefitFormula::AccountBalance,
            &EngineConfig::default(),
            2025,
        )
        .expect("valid request")
    }

    fn sample_request() -> ForecastRequest {
        let mut request = ForecastRequest::basic(30, Sex::Female, 7_500.0, 2015, 2055, 0.03);
        request.desired_monthly_benefit = Some(4_000.0);
        request
    }

    #[test]
    fn entry_copies_request_and_rounded_result() {
        let request = sample_request();
        let result = forecast(&request);
        let entry = UsageLogEntry::from_forecast(&request, &result, at(9, 7), Some(" 00-950 ".into()));

        assert_eq!(entry.date, "2025-03-14");
        assert_eq!(entry.time, "09:07:05");
        assert_eq!(entry.expected_pension, Some(4_000.0));
        assert_eq!(entry.funds_accumulated, None);
        assert_eq!(entry.actual_pension, result.nominal_monthly_benefit.round());
        assert_eq!(entry.postal_code.as_deref(), Some("00-950"));
    }

    #[test]
    fn submission_key_lists_inputs_and_rounded_outputs() {
        let request = sample_request();
        let result = forecast(&request);
        let key = submission_key(&request, &result);
        let expected_prefix = "result|30|female|7500|2015|2055|0|0|4000|";
        assert!(key.starts_with(expected_prefix), "unexpected key {key}");
        assert_eq!(key.split('|').count(), 11);
    }

    #[test]
    fn repeated_submission_is_logged_once() {
        let request = sample_request();
        let result = forecast(&request);
        let key = submission_key(&request, &result);
        let mut log = UsageLog::new();

        let entry = UsageLogEntry::from_forecast(&request, &result, at(10, 0), None);
        assert!(log.record_if_new(entry.clone(), key.clone()));
        assert!(!log.record_if_new(entry.clone(), key.clone()));
        assert_eq!(log.len(), 1);

        let mut changed = request.clone();
        changed.include_sick_leave = true;
        let changed_result = forecast(&changed);
        let changed_key = submission_key(&changed, &changed_result);
        assert_ne!(changed_key, key);
        assert!(log.record_if_new(entry.clone(), changed_key));
        assert!(log.record_if_new(entry, key));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn filter_matches_fields_case_insensitively() {
        let request = sample_request();
        let result = forecast(&request);
        let mut log = UsageLog::new();
        log.record(UsageLogEntry::from_forecast(&request, &result, at(8, 30), Some("31-100".into())));
        let mut male = request.clone();
        male.sex = Sex::Male;
        log.record(UsageLogEntry::from_forecast(&male, &forecast(&male), at(12, 45), None));

        assert_eq!(log.filter("").len(), 2);
        assert_eq!(log.filter("FEMALE").len(), 1);
        assert_eq!(log.filter("31-100").len(), 1);
        assert_eq!(log.filter("12:45").len(), 1);
        assert_eq!(log.filter("7500").len(), 2);
        assert!(log.filter("no such value").is_empty());
    }

    #[test]
    fn csv_export_uses_admin_headers_and_blanks() {
        let mut request = sample_request();
        request.desired_monthly_benefit = None;
        request.include_sick_leave = true;
        let result = forecast(&request);
        let mut log = UsageLog::new();
        log.record(UsageLogEntry::from_forecast(&request, &result, at(9, 0), None));

        let csv = log.to_csv().expect("export should succeed");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(
                "Date of use,Time of use,Expected pension,Age,Sex,Salary amount,\
                 Whether periods of illness were included,Amount of funds accumulated,\
                 Actual pension,Real (inflation-adjusted) pension,Postal code"
            )
        );
        let row = lines.next().expect("one data row");
        let cells: Vec<&str> = row.split(',').collect();
        assert_eq!(cells.len(), 11);
        assert_eq!(cells[0], "2025-03-14");
        assert_eq!(cells[2], "");
        assert_eq!(cells[4], "female");
        assert_eq!(cells[6], "Yes");
        assert_eq!(cells[7], "");
        assert_eq!(cells[10], "");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn capped_log_drops_oldest_entries() {
        let request = sample_request();
        let result = forecast(&request);
        let mut log = UsageLog::with_capacity(2);
        for minute in 0..3 {
            let mut changed = request.clone();
            changed.starting_funds = f64::from(minute) * 1_000.0;
            let entry = UsageLogEntry::from_forecast(&changed, &result, at(9, minute), None);
            assert!(log.record_if_new(entry, submission_key(&changed, &result)));
        }

        assert_eq!(log.len(), 2);
        let times: Vec<&str> = log.entries().iter().map(|e| e.time.as_str()).collect();
        assert_eq!(times, vec!["09:01:05", "09:02:05"]);
    }

    #[test]
    fn clear_resets_duplicate_detection() {
        let request = sample_request();
        let result = forecast(&request);
        let key = submission_key(&request, &result);
        let mut log = UsageLog::new();
        let entry = UsageLogEntry::from_forecast(&request, &result, at(9, 0), None);
        assert!(log.record_if_new(entry.clone(), key.clone()));
        log.clear();
        assert!(log.is_empty());
        assert!(log.record_if_new(entry, key));
    }
}
