use std::collections::BTreeMap;

use crate::alignment::AlignedSeries;
use crate::grouping::GroupKey;
use crate::periods::{Period, BASELINE, IMPACT, RECOVERY};

/// Volume level of one group in one analysis period, relative to the
/// Baseline period of the same group. `None` means undefined, never NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactMetric {
    pub group: GroupKey,
    pub period: String,
    pub baseline_volume: Option<f64>,
    pub period_volume: Option<f64>,
    pub percent_change: Option<f64>,
}

/// Post-impact recovery of one group: how far the Impact period fell below
/// Baseline, how far the Recovery period climbed from the Impact floor, and
/// whether it reached 95% of the Baseline level.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryAssessment {
    pub group: GroupKey,
    pub impact_decline_pct: Option<f64>,
    pub recovery_rate_pct: Option<f64>,
    pub full_recovery: Option<bool>,
}

/// Mean daily volume over the period's share of the axis. Gap days are
/// excluded from the mean, not treated as zero; a period with no observed
/// days is undefined.
pub fn period_mean(series: &AlignedSeries, period: &Period) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (date, value) in series.iter_days() {
        if !period.contains(date) {
            continue;
        }
        if let Some(value) = value {
            sum += value;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Percent change of `value` against `reference`, defined only when both
/// exist and the reference is positive.
pub fn percent_change(value: Option<f64>, reference: Option<f64>) -> Option<f64> {
    let value = value?;
    let reference = reference?;
    (reference > 0.0).then(|| (value - reference) / reference * 100.0)
}

/// One metric per (group, period), groups in key order and periods in
/// configuration order.
pub fn compute_impact(
    groups: &BTreeMap<GroupKey, AlignedSeries>,
    periods: &[Period],
) -> Vec<ImpactMetric> {
    let baseline_period = periods.iter().find(|p| p.name == BASELINE);

    let mut metrics = Vec::new();
    for (group, series) in groups {
        let baseline_volume = baseline_period.and_then(|p| period_mean(series, p));
        for period in periods {
            let period_volume = period_mean(series, period);
            metrics.push(ImpactMetric {
                group: group.clone(),
                period: period.name.clone(),
                baseline_volume,
                period_volume,
                percent_change: percent_change(period_volume, baseline_volume),
            });
        }
    }
    metrics
}

/// Recovery assessments per group, derived from the standard period names.
/// A custom period set without Impact/Recovery periods yields no
/// assessments.
pub fn assess_recovery(metrics: &[ImpactMetric]) -> Vec<RecoveryAssessment> {
    let has_standard_periods = metrics
        .iter()
        .any(|m| m.period == IMPACT || m.period == RECOVERY);
    if !has_standard_periods {
        return Vec::new();
    }

    let mut groups: Vec<&GroupKey> = Vec::new();
    for metric in metrics {
        if !groups.contains(&&metric.group) {
            groups.push(&metric.group);
        }
    }

    let volume_of = |group: &GroupKey, period: &str| {
        metrics
            .iter()
            .find(|m| &m.group == group && m.period == period)
            .and_then(|m| m.period_volume)
    };

    groups
        .into_iter()
        .map(|group| {
            let baseline = volume_of(group, BASELINE);
            let impact = volume_of(group, IMPACT);
            let recovery = volume_of(group, RECOVERY);
            let full_recovery = match (recovery, baseline) {
                (Some(recovered), Some(reference)) if reference > 0.0 => {
                    Some(recovered >= 0.95 * reference)
                }
                _ => None,
            };
            RecoveryAssessment {
                group: group.clone(),
                impact_decline_pct: percent_change(impact, baseline),
                recovery_rate_pct: percent_change(recovery, impact),
                full_recovery,
            }
        })
        .collect()
}
