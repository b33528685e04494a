use std::fmt;

use chrono::Datelike;

use crate::alignment::AlignedSeries;
use crate::grouping::GroupKey;

/// Norwegian meteorological season for a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Season {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Average daily volume of one group in one calendar month (1-12),
/// pooled across all years of the aligned history.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalProfile {
    pub group: GroupKey,
    pub month: u32,
    pub average_volume: Option<f64>,
}

/// Exactly twelve rows per group, months in calendar order. Gap days are
/// excluded from each month's mean; a month never observed is undefined.
pub fn seasonal_profile(group: &GroupKey, series: &AlignedSeries) -> Vec<SeasonalProfile> {
    let mut sums = [0.0f64; 12];
    let mut counts = [0usize; 12];
    for (date, value) in series.iter_days() {
        if let Some(value) = value {
            let idx = (date.month() - 1) as usize;
            sums[idx] += value;
            counts[idx] += 1;
        }
    }

    (1..=12u32)
        .map(|month| {
            let idx = (month - 1) as usize;
            SeasonalProfile {
                group: group.clone(),
                month,
                average_volume: (counts[idx] > 0).then(|| sums[idx] / counts[idx] as f64),
            }
        })
        .collect()
}
