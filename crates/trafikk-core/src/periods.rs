use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};

pub const BASELINE: &str = "Baseline";
pub const IMPACT: &str = "Impact";
pub const RECOVERY: &str = "Recovery";

/// Named half-open calendar interval `[start, end)`. An open bound means
/// unbounded on that side. Periods are configuration, not derived data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Period {
    pub fn new(name: impl Into<String>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date < end)
    }

    fn effective_start(&self) -> NaiveDate {
        self.start.unwrap_or(NaiveDate::MIN)
    }

    fn effective_end(&self) -> NaiveDate {
        self.end.unwrap_or(NaiveDate::MAX)
    }
}

/// Baseline up to the first Norwegian lockdown, Impact through the rest of
/// 2020, Recovery from the start of 2021.
pub fn default_periods() -> Vec<Period> {
    let lockdown = NaiveDate::from_ymd_opt(2020, 3, 1).expect("valid calendar date");
    let recovery = NaiveDate::from_ymd_opt(2021, 1, 1).expect("valid calendar date");
    vec![
        Period::new(BASELINE, None, Some(lockdown)),
        Period::new(IMPACT, Some(lockdown), Some(recovery)),
        Period::new(RECOVERY, Some(recovery), None),
    ]
}

/// Rejects period sets the segmenter cannot interpret unambiguously:
/// empty or duplicate names, inverted bounds, overlapping intervals, or a
/// set lacking the Baseline reference period.
pub fn validate(periods: &[Period]) -> Result<()> {
    if periods.is_empty() {
        return Err(PipelineError::Config(
            "at least one analysis period is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for period in periods {
        if period.name.trim().is_empty() {
            return Err(PipelineError::Config(
                "period names must not be empty".to_string(),
            ));
        }
        if !names.insert(period.name.as_str()) {
            return Err(PipelineError::Config(format!(
                "duplicate period name '{}'",
                period.name
            )));
        }
        if let (Some(start), Some(end)) = (period.start, period.end) {
            if start >= end {
                return Err(PipelineError::Config(format!(
                    "period '{}' start {} must precede end {}",
                    period.name, start, end
                )));
            }
        }
    }

    if !names.contains(BASELINE) {
        return Err(PipelineError::Config(format!(
            "period set must include a '{BASELINE}' period"
        )));
    }

    let mut ordered: Vec<&Period> = periods.iter().collect();
    ordered.sort_by_key(|p| p.effective_start());
    for pair in ordered.windows(2) {
        if pair[0].effective_end() > pair[1].effective_start() {
            return Err(PipelineError::Config(format!(
                "periods '{}' and '{}' overlap",
                pair[0].name, pair[1].name
            )));
        }
    }

    Ok(())
}
