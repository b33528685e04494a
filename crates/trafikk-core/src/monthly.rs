use std::collections::HashMap;
use std::fmt;

use chrono::Datelike;

use crate::alignment::AlignedSeries;
use crate::grouping::GroupKey;
use crate::impact::percent_change;
use crate::seasonal::Season;

/// Traffic volume band of a month's mean daily volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeClass {
    VeryHigh,
    High,
    Moderate,
    Low,
    VeryLow,
}

impl VolumeClass {
    pub fn from_mean(mean: f64) -> VolumeClass {
        if mean > 50_000.0 {
            VolumeClass::VeryHigh
        } else if mean > 40_000.0 {
            VolumeClass::High
        } else if mean > 30_000.0 {
            VolumeClass::Moderate
        } else if mean > 20_000.0 {
            VolumeClass::Low
        } else {
            VolumeClass::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeClass::VeryHigh => "very_high",
            VolumeClass::High => "high",
            VolumeClass::Moderate => "moderate",
            VolumeClass::Low => "low",
            VolumeClass::VeryLow => "very_low",
        }
    }
}

impl fmt::Display for VolumeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Month-over-month movement band of a group's mean daily volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTrend {
    StrongRecovery,
    ModerateRecovery,
    Stable,
    Declining,
    SharpDecline,
}

impl RecoveryTrend {
    pub fn from_mom_change(change_pct: f64) -> RecoveryTrend {
        if change_pct > 10.0 {
            RecoveryTrend::StrongRecovery
        } else if change_pct > 5.0 {
            RecoveryTrend::ModerateRecovery
        } else if change_pct > -5.0 {
            RecoveryTrend::Stable
        } else if change_pct > -15.0 {
            RecoveryTrend::Declining
        } else {
            RecoveryTrend::SharpDecline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryTrend::StrongRecovery => "strong_recovery",
            RecoveryTrend::ModerateRecovery => "moderate_recovery",
            RecoveryTrend::Stable => "stable",
            RecoveryTrend::Declining => "declining",
            RecoveryTrend::SharpDecline => "sharp_decline",
        }
    }
}

impl fmt::Display for RecoveryTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One calendar month of one group: totals, means, growth against the
/// previous month and the same month a year earlier, and the derived
/// classification labels. Undefined references stay undefined rather than
/// degrading to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyMetric {
    pub group: GroupKey,
    pub year: i32,
    pub month: u32,
    pub season: Season,
    pub traffic_sum: f64,
    pub traffic_mean: Option<f64>,
    pub traffic_max: Option<f64>,
    pub traffic_count: usize,
    pub mom_change_pct: Option<f64>,
    pub yoy_change_pct: Option<f64>,
    pub volume_class: Option<VolumeClass>,
    pub recovery_trend: Option<RecoveryTrend>,
}

struct MonthBucket {
    year: i32,
    month: u32,
    sum: f64,
    max: Option<f64>,
    observed: usize,
}

/// One row per calendar month touched by the group's aligned axis, in
/// chronological order. Because the axis is contiguous, consecutive
/// buckets are consecutive calendar months.
pub fn monthly_metrics(group: &GroupKey, series: &AlignedSeries) -> Vec<MonthlyMetric> {
    let mut buckets: Vec<MonthBucket> = Vec::new();
    for (date, value) in series.iter_days() {
        let year = date.year();
        let month = date.month();
        let needs_new = buckets
            .last()
            .is_none_or(|b| b.year != year || b.month != month);
        if needs_new {
            buckets.push(MonthBucket {
                year,
                month,
                sum: 0.0,
                max: None,
                observed: 0,
            });
        }
        if let (Some(value), Some(bucket)) = (value, buckets.last_mut()) {
            bucket.sum += value;
            bucket.max = Some(bucket.max.map_or(value, |max| max.max(value)));
            bucket.observed += 1;
        }
    }

    let means: Vec<Option<f64>> = buckets
        .iter()
        .map(|b| (b.observed > 0).then(|| b.sum / b.observed as f64))
        .collect();
    let mean_by_month: HashMap<(i32, u32), Option<f64>> = buckets
        .iter()
        .zip(&means)
        .map(|(b, mean)| ((b.year, b.month), *mean))
        .collect();

    buckets
        .iter()
        .enumerate()
        .map(|(idx, bucket)| {
            let mean = means[idx];
            let previous = if idx > 0 { means[idx - 1] } else { None };
            let year_earlier = mean_by_month
                .get(&(bucket.year - 1, bucket.month))
                .copied()
                .flatten();

            let mom_change_pct = percent_change(mean, previous);
            let yoy_change_pct = percent_change(mean, year_earlier);

            MonthlyMetric {
                group: group.clone(),
                year: bucket.year,
                month: bucket.month,
                season: Season::from_month(bucket.month),
                traffic_sum: bucket.sum,
                traffic_mean: mean,
                traffic_max: bucket.max,
                traffic_count: bucket.observed,
                mom_change_pct,
                yoy_change_pct,
                volume_class: mean.map(VolumeClass::from_mean),
                recovery_trend: mom_change_pct.map(RecoveryTrend::from_mom_change),
            }
        })
        .collect()
}

/// Descriptive statistics over one group's monthly mean volumes. Undefined
/// months are excluded throughout; the spread needs at least two defined
/// months, and growth averages only defined month-over-month changes.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatistics {
    pub group: GroupKey,
    pub months_tracked: usize,
    pub total_traffic: f64,
    pub avg_traffic: Option<f64>,
    pub std_traffic: Option<f64>,
    pub min_traffic: Option<f64>,
    pub max_traffic: Option<f64>,
    pub avg_growth_pct: Option<f64>,
}

/// Summarizes a group's monthly history for the run report and the CLI
/// analysis view.
pub fn describe_months(group: &GroupKey, months: &[MonthlyMetric]) -> GroupStatistics {
    let means: Vec<f64> = months.iter().filter_map(|m| m.traffic_mean).collect();
    let growth: Vec<f64> = months.iter().filter_map(|m| m.mom_change_pct).collect();

    GroupStatistics {
        group: group.clone(),
        months_tracked: months.len(),
        total_traffic: months.iter().map(|m| m.traffic_sum).sum(),
        avg_traffic: mean(&means),
        std_traffic: sample_std(&means),
        min_traffic: means.iter().copied().reduce(f64::min),
        max_traffic: means.iter().copied().reduce(f64::max),
        avg_growth_pct: mean(&growth),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
