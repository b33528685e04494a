//! End-to-end batch run: discover and load observations, align per station,
//! aggregate into comparison groups, compute the analytics, and publish the
//! artifacts atomically.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alignment::AlignedSeries;
use crate::config::PipelineConfig;
use crate::grouping::{aggregate_by, GroupKey};
use crate::impact::{assess_recovery, compute_impact, RecoveryAssessment};
use crate::monthly::{describe_months, monthly_metrics, GroupStatistics, MonthlyMetric};
use crate::observations::{discover_observation_files, load_observations, LoadReport};
use crate::outputs::{self, Artifacts, TrendRow};
use crate::rolling::rolling_for_windows;
use crate::seasonal::{seasonal_profile, SeasonalProfile};

/// Machine-readable report of one run, written to `run_summary.json` and
/// echoed by the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub load: LoadSummary,
    pub stations: StationSummary,
    pub metrics: MetricsSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statistics: Vec<StatisticsSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recovery: Vec<RecoverySummary>,
    pub artifacts: ArtifactSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_rejected: usize,
    pub duplicates_replaced: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_reject_reasons: Vec<ReasonCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StationSummary {
    /// Stations in the metadata table.
    pub table_rows: usize,
    pub table_rows_rejected: usize,
    /// Distinct stations with at least one kept observation.
    pub observed: usize,
    /// Observed stations absent from the table, grouped as `other`.
    pub unresolved: usize,
    /// Stations present in the raw data that kept zero valid rows.
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSummary {
    pub groups: usize,
    pub metrics_groups: usize,
    pub periods: usize,
    /// Impact rows with an undefined volume or percent change.
    pub undefined_impact_metrics: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSummary {
    pub group_kind: String,
    pub group_key: String,
    pub months_tracked: usize,
    pub total_traffic: f64,
    pub avg_traffic: Option<f64>,
    pub std_traffic: Option<f64>,
    pub min_traffic: Option<f64>,
    pub max_traffic: Option<f64>,
    pub avg_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoverySummary {
    pub group_kind: String,
    pub group_key: String,
    pub impact_decline_pct: Option<f64>,
    pub recovery_rate_pct: Option<f64>,
    pub full_recovery: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactSummary {
    pub trend_rows: usize,
    pub impact_rows: usize,
    pub seasonal_rows: usize,
    pub monthly_rows: usize,
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    info!(path = %config.observations.display(), "discovering observation files");
    let files = discover_observation_files(&config.observations)
        .context("failed to discover observation files")?;

    info!(files = files.len(), "loading observations");
    let loaded = load_observations(&files).context("failed to load observations")?;

    let stations =
        crate::stations::load_station_table(&config.stations).with_context(|| {
            format!(
                "failed to load station table {}",
                config.stations.display()
            )
        })?;

    let unresolved = loaded
        .by_station
        .keys()
        .filter(|station_id| stations.get(station_id).is_none())
        .count();
    if unresolved > 0 {
        warn!(
            stations = unresolved,
            "observed stations missing from the station table, grouped as other"
        );
    }

    let mut station_series: BTreeMap<String, AlignedSeries> = BTreeMap::new();
    for (station_id, observations) in &loaded.by_station {
        if let Some(series) = AlignedSeries::from_observations(observations) {
            station_series.insert(station_id.clone(), series);
        }
    }

    // Comparison aggregates plus the per-station series themselves.
    let mut groups: BTreeMap<GroupKey, AlignedSeries> = BTreeMap::new();
    groups.extend(aggregate_by(&station_series, |_| GroupKey::Overall));
    groups.extend(aggregate_by(&station_series, |station_id| {
        GroupKey::Region(stations.region_of(station_id))
    }));
    groups.extend(aggregate_by(&station_series, |station_id| {
        GroupKey::RoadCategory(stations.road_category_of(station_id))
    }));
    for (station_id, series) in &station_series {
        groups.insert(GroupKey::Station(station_id.clone()), series.clone());
    }

    info!(groups = groups.len(), "computing rolling trends");
    let mut trends: Vec<TrendRow> = Vec::new();
    for (group, series) in &groups {
        debug!(
            group = %group,
            days = series.len(),
            observed = series.observed_days(),
            "aligned series ready"
        );
        let rolled = rolling_for_windows(series, &config.windows);
        for (idx, (date, value)) in series.iter_days().enumerate() {
            trends.push(TrendRow {
                group: group.clone(),
                date,
                daily_volume: value,
                rolling: rolled.iter().map(|r| r.values[idx]).collect(),
            });
        }
    }

    let metrics_groups: BTreeMap<GroupKey, AlignedSeries> = groups
        .iter()
        .filter(|(key, _)| key.is_metrics_group())
        .map(|(key, series)| (key.clone(), series.clone()))
        .collect();

    info!(
        metrics_groups = metrics_groups.len(),
        periods = config.periods.len(),
        "computing impact metrics"
    );
    let impact = compute_impact(&metrics_groups, &config.periods);
    let recovery = assess_recovery(&impact);

    let mut seasonal: Vec<SeasonalProfile> = Vec::new();
    let mut monthly: Vec<MonthlyMetric> = Vec::new();
    let mut statistics: Vec<GroupStatistics> = Vec::new();
    for (group, series) in &metrics_groups {
        seasonal.extend(seasonal_profile(group, series));
        let months = monthly_metrics(group, series);
        statistics.push(describe_months(group, &months));
        monthly.extend(months);
    }

    let undefined_impact_metrics = impact
        .iter()
        .filter(|metric| metric.period_volume.is_none() || metric.percent_change.is_none())
        .count();

    let summary = RunSummary {
        load: load_summary(&loaded.report),
        stations: StationSummary {
            table_rows: stations.len(),
            table_rows_rejected: stations.rows_rejected(),
            observed: loaded.by_station.len(),
            unresolved,
            dropped: loaded.report.stations_dropped,
        },
        metrics: MetricsSummary {
            groups: groups.len(),
            metrics_groups: metrics_groups.len(),
            periods: config.periods.len(),
            undefined_impact_metrics,
        },
        statistics: statistics.iter().map(statistics_summary).collect(),
        recovery: recovery.iter().map(recovery_summary).collect(),
        artifacts: ArtifactSummary {
            trend_rows: trends.len(),
            impact_rows: impact.len(),
            seasonal_rows: seasonal.len(),
            monthly_rows: monthly.len(),
        },
    };

    info!(directory = %config.out_dir.display(), "publishing artifacts");
    outputs::publish(
        &config.out_dir,
        &Artifacts {
            windows: &config.windows,
            trends: &trends,
            impact: &impact,
            seasonal: &seasonal,
            monthly: &monthly,
            summary: &summary,
        },
    )?;

    info!(
        rows_kept = summary.load.rows_kept,
        groups = summary.metrics.groups,
        trend_rows = summary.artifacts.trend_rows,
        "run complete"
    );
    Ok(summary)
}

fn load_summary(report: &LoadReport) -> LoadSummary {
    let mut reasons: Vec<(String, usize)> = report
        .reject_reasons
        .iter()
        .map(|(reason, count)| (reason.clone(), *count))
        .collect();
    reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_reject_reasons = reasons
        .into_iter()
        .take(5)
        .map(|(reason, count)| ReasonCount { reason, count })
        .collect();

    LoadSummary {
        files_read: report.files_read,
        files_skipped: report.files_skipped,
        rows_read: report.rows_read,
        rows_kept: report.rows_kept,
        rows_rejected: report.rows_rejected,
        duplicates_replaced: report.duplicates_replaced,
        top_reject_reasons,
    }
}

fn statistics_summary(stats: &GroupStatistics) -> StatisticsSummary {
    StatisticsSummary {
        group_kind: stats.group.kind().to_string(),
        group_key: stats.group.label().to_string(),
        months_tracked: stats.months_tracked,
        total_traffic: stats.total_traffic,
        avg_traffic: stats.avg_traffic,
        std_traffic: stats.std_traffic,
        min_traffic: stats.min_traffic,
        max_traffic: stats.max_traffic,
        avg_growth_pct: stats.avg_growth_pct,
    }
}

fn recovery_summary(assessment: &RecoveryAssessment) -> RecoverySummary {
    RecoverySummary {
        group_kind: assessment.group.kind().to_string(),
        group_key: assessment.group.label().to_string(),
        impact_decline_pct: assessment.impact_decline_pct,
        recovery_rate_pct: assessment.recovery_rate_pct,
        full_recovery: assessment.full_recovery,
    }
}
