use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use super::non_negative;
use super::types::{GapFill, SalaryPoint};

/// Explicit salary observations, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct SalarySources<'a> {
    pub historical: &'a [SalaryPoint],
    pub future: &'a [SalaryPoint],
}

/// The salary the growth chain starts from.
#[derive(Debug, Clone, Copy)]
pub struct SalaryAnchor {
    pub year: i32,
    pub monthly: f64,
}

/// Dense monthly gross salary, one entry per year from `start_year`.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryPath {
    start_year: i32,
    salaries: Vec<f64>,
}

impl SalaryPath {
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn len(&self) -> usize {
        self.salaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.salaries.is_empty()
    }

    pub fn salaries(&self) -> &[f64] {
        &self.salaries
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        let idx = usize::try_from(year - self.start_year).ok()?;
        self.salaries.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.salaries
            .iter()
            .enumerate()
            .map(|(idx, &salary)| (self.start_year + idx as i32, salary))
    }
}

/// Reconstructs a salary for every year in `start_year..end_year`.
///
/// Per year, the first rule that applies wins: a historical point, a future
/// override, an interpolated value (only with [`GapFill::Interpolate`] and
/// only between two explicit points), then the growth chain. The chain is
/// seeded at the anchor year (clamped into range), grows forward by
/// `1 + growth_rate` and is divided back for years before the anchor.
pub fn resolve(
    start_year: i32,
    end_year: i32,
    anchor: SalaryAnchor,
    sources: SalarySources<'_>,
    growth_rate: f64,
    gap_fill: GapFill,
) -> SalaryPath {
    let len = (i64::from(end_year) - i64::from(start_year)).max(0) as usize;
    if len == 0 {
        return SalaryPath {
            start_year,
            salaries: Vec::new(),
        };
    }

    let growth = 1.0 + non_negative(growth_rate);
    let explicit = explicit_points(sources);
    let pinned = (0..len)
        .map(|idx| {
            let year = start_year + idx as i32;
            explicit.get(&year).copied().or_else(|| match gap_fill {
                GapFill::Interpolate => interpolate(&explicit, year),
                GapFill::Forward => None,
            })
        })
        .collect::<Vec<_>>();

    let anchor_idx = (i64::from(anchor.year) - i64::from(start_year)).clamp(0, len as i64 - 1) as usize;
    let anchor_salary = pinned[anchor_idx].unwrap_or_else(|| non_negative(anchor.monthly));

    let after = pinned[anchor_idx + 1..]
        .iter()
        .scan(anchor_salary, |prev, pin| {
            *prev = pin.unwrap_or(*prev * growth);
            Some(*prev)
        })
        .collect::<Vec<_>>();
    let mut before = pinned[..anchor_idx]
        .iter()
        .rev()
        .scan(anchor_salary, |next, pin| {
            *next = pin.unwrap_or(*next / growth);
            Some(*next)
        })
        .collect::<Vec<_>>();
    before.reverse();

    let salaries = before
        .into_iter()
        .chain(std::iter::once(anchor_salary))
        .chain(after)
        .collect();

    SalaryPath {
        start_year,
        salaries,
    }
}

fn explicit_points(sources: SalarySources<'_>) -> BTreeMap<i32, f64> {
    let mut points = BTreeMap::new();
    // Historical points are inserted last so they overwrite future overrides.
    for point in sources.future.iter().chain(sources.historical) {
        if point.gross_monthly.is_finite() {
            points.insert(point.year, point.gross_monthly.max(0.0));
        }
    }
    points
}

fn interpolate(explicit: &BTreeMap<i32, f64>, year: i32) -> Option<f64> {
    let (&lo_year, &lo) = explicit.range(..year).next_back()?;
    let (&hi_year, &hi) = explicit.range((Excluded(year), Unbounded)).next()?;
    let w = (i64::from(year) - i64::from(lo_year)) as f64
        / (i64::from(hi_year) - i64::from(lo_year)) as f64;
    Some(lo + (hi - lo) * w)
}
