//! Dataset writer: renders the processed artifacts and publishes them
//! atomically into the output directory.
//!
//! Artifact layout:
//!
//! - `traffic_trends.csv`: `group_kind,group_key,date,daily_volume` plus one
//!   `rolling_{W}d` column per configured window, in configuration order.
//!   Every group appears, including per-station series and the `other`
//!   fallback groups, sorted by group then date. Daily volumes are rendered
//!   as whole counts, rolling means to one decimal.
//! - `impact_metrics.csv`: `group_kind,group_key,period,baseline_volume,
//!   period_volume,percent_change`, one decimal.
//! - `seasonal_profile.csv`: `group_kind,group_key,month,average_volume`,
//!   twelve rows per group.
//! - `monthly_metrics.csv`: `group_kind,group_key,year,month,season,
//!   traffic_sum,traffic_mean,traffic_max,traffic_count,mom_change_pct,
//!   yoy_change_pct,volume_class,recovery_trend`.
//! - `run_summary.json`: the machine-readable run report.
//!
//! Undefined values render as empty fields, never as 0 or NaN. Nothing
//! run-varying (timestamps, hostnames) is written, so identical inputs
//! produce byte-identical artifacts.
//!
//! Every artifact is first written to a `.tmp` sibling; only once all five
//! are staged is each renamed over its final name. A failure before the
//! rename phase removes the temporaries and leaves the previous store
//! untouched.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::grouping::GroupKey;
use crate::impact::ImpactMetric;
use crate::monthly::MonthlyMetric;
use crate::pipeline::RunSummary;
use crate::seasonal::SeasonalProfile;

pub const TRENDS_FILE: &str = "traffic_trends.csv";
pub const IMPACT_FILE: &str = "impact_metrics.csv";
pub const SEASONAL_FILE: &str = "seasonal_profile.csv";
pub const MONTHLY_FILE: &str = "monthly_metrics.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// One `traffic_trends.csv` row before rendering. `rolling` is parallel to
/// the configured window list.
#[derive(Debug, Clone)]
pub struct TrendRow {
    pub group: GroupKey,
    pub date: NaiveDate,
    pub daily_volume: Option<f64>,
    pub rolling: Vec<Option<f64>>,
}

/// Everything one run publishes.
pub struct Artifacts<'a> {
    pub windows: &'a [usize],
    pub trends: &'a [TrendRow],
    pub impact: &'a [ImpactMetric],
    pub seasonal: &'a [SeasonalProfile],
    pub monthly: &'a [MonthlyMetric],
    pub summary: &'a RunSummary,
}

struct StagedArtifact {
    name: &'static str,
    tmp: PathBuf,
    target: PathBuf,
}

/// Stage and publish all artifacts. Fails the whole run if any one artifact
/// cannot be written.
pub fn publish(out_dir: &Path, artifacts: &Artifacts<'_>) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

    let mut staged = Vec::new();
    if let Err(error) = stage_all(out_dir, artifacts, &mut staged) {
        discard(&staged);
        return Err(error.into());
    }

    for artifact in &staged {
        if let Err(error) = fs::rename(&artifact.tmp, &artifact.target) {
            let failed = PipelineError::Publish {
                artifact: artifact.name.to_string(),
                message: error.to_string(),
            };
            discard(&staged);
            return Err(failed.into());
        }
    }

    info!(directory = %out_dir.display(), "published processed artifacts");
    Ok(())
}

fn stage_all(
    out_dir: &Path,
    artifacts: &Artifacts<'_>,
    staged: &mut Vec<StagedArtifact>,
) -> std::result::Result<(), PipelineError> {
    stage(out_dir, TRENDS_FILE, staged, |path| {
        write_trends(path, artifacts.windows, artifacts.trends)
    })?;
    stage(out_dir, IMPACT_FILE, staged, |path| {
        write_impact(path, artifacts.impact)
    })?;
    stage(out_dir, SEASONAL_FILE, staged, |path| {
        write_seasonal(path, artifacts.seasonal)
    })?;
    stage(out_dir, MONTHLY_FILE, staged, |path| {
        write_monthly(path, artifacts.monthly)
    })?;
    stage(out_dir, SUMMARY_FILE, staged, |path| {
        write_summary(path, artifacts.summary)
    })?;
    Ok(())
}

fn stage(
    out_dir: &Path,
    name: &'static str,
    staged: &mut Vec<StagedArtifact>,
    write: impl FnOnce(&Path) -> crate::error::Result<()>,
) -> std::result::Result<(), PipelineError> {
    let target = out_dir.join(name);
    let tmp = out_dir.join(format!("{name}.tmp"));
    if let Err(error) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::Publish {
            artifact: name.to_string(),
            message: error.to_string(),
        });
    }
    debug!(artifact = name, "staged artifact");
    staged.push(StagedArtifact { name, tmp, target });
    Ok(())
}

fn discard(staged: &[StagedArtifact]) {
    for artifact in staged {
        let _ = fs::remove_file(&artifact.tmp);
    }
}

fn write_trends(path: &Path, windows: &[usize], rows: &[TrendRow]) -> crate::error::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![
        "group_kind".to_string(),
        "group_key".to_string(),
        "date".to_string(),
        "daily_volume".to_string(),
    ];
    header.extend(windows.iter().map(|window| format!("rolling_{window}d")));
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.group.kind().to_string(),
            row.group.label().to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            decimal(row.daily_volume, 0),
        ];
        record.extend(row.rolling.iter().map(|value| decimal(*value, 1)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_impact(path: &Path, metrics: &[ImpactMetric]) -> crate::error::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "group_kind",
        "group_key",
        "period",
        "baseline_volume",
        "period_volume",
        "percent_change",
    ])?;
    for metric in metrics {
        writer.write_record(&[
            metric.group.kind().to_string(),
            metric.group.label().to_string(),
            metric.period.clone(),
            decimal(metric.baseline_volume, 1),
            decimal(metric.period_volume, 1),
            decimal(metric.percent_change, 1),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_seasonal(path: &Path, profiles: &[SeasonalProfile]) -> crate::error::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["group_kind", "group_key", "month", "average_volume"])?;
    for profile in profiles {
        writer.write_record(&[
            profile.group.kind().to_string(),
            profile.group.label().to_string(),
            profile.month.to_string(),
            decimal(profile.average_volume, 1),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_monthly(path: &Path, metrics: &[MonthlyMetric]) -> crate::error::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "group_kind",
        "group_key",
        "year",
        "month",
        "season",
        "traffic_sum",
        "traffic_mean",
        "traffic_max",
        "traffic_count",
        "mom_change_pct",
        "yoy_change_pct",
        "volume_class",
        "recovery_trend",
    ])?;
    for metric in metrics {
        writer.write_record(&[
            metric.group.kind().to_string(),
            metric.group.label().to_string(),
            metric.year.to_string(),
            metric.month.to_string(),
            metric.season.to_string(),
            decimal(Some(metric.traffic_sum), 0),
            decimal(metric.traffic_mean, 1),
            decimal(metric.traffic_max, 0),
            metric.traffic_count.to_string(),
            decimal(metric.mom_change_pct, 1),
            decimal(metric.yoy_change_pct, 1),
            metric
                .volume_class
                .map(|class| class.to_string())
                .unwrap_or_default(),
            metric
                .recovery_trend
                .map(|trend| trend.to_string())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(path: &Path, summary: &RunSummary) -> crate::error::Result<()> {
    let bytes = serde_json::to_vec_pretty(summary)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn decimal(value: Option<f64>, places: usize) -> String {
    match value {
        Some(value) => format!("{:.*}", places, value),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periods::BASELINE;
    use crate::seasonal::Season;
    use std::collections::BTreeMap;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    struct Fixture {
        windows: Vec<usize>,
        trends: Vec<TrendRow>,
        impact: Vec<ImpactMetric>,
        seasonal: Vec<SeasonalProfile>,
        monthly: Vec<MonthlyMetric>,
        summary: RunSummary,
    }

    impl Fixture {
        fn artifacts(&self) -> Artifacts<'_> {
            Artifacts {
                windows: &self.windows,
                trends: &self.trends,
                impact: &self.impact,
                seasonal: &self.seasonal,
                monthly: &self.monthly,
                summary: &self.summary,
            }
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            windows: vec![7, 28],
            trends: vec![
                TrendRow {
                    group: GroupKey::Overall,
                    date: date("2020-01-01"),
                    daily_volume: Some(1000.0),
                    rolling: vec![None, None],
                },
                TrendRow {
                    group: GroupKey::Overall,
                    date: date("2020-01-02"),
                    daily_volume: None,
                    rolling: vec![None, None],
                },
            ],
            impact: vec![ImpactMetric {
                group: GroupKey::Overall,
                period: BASELINE.to_string(),
                baseline_volume: Some(1000.0),
                period_volume: Some(1000.0),
                percent_change: Some(0.0),
            }],
            seasonal: vec![SeasonalProfile {
                group: GroupKey::Overall,
                month: 1,
                average_volume: Some(1000.0),
            }],
            monthly: vec![MonthlyMetric {
                group: GroupKey::Overall,
                year: 2020,
                month: 1,
                season: Season::Winter,
                traffic_sum: 1000.0,
                traffic_mean: Some(1000.0),
                traffic_max: Some(1000.0),
                traffic_count: 1,
                mom_change_pct: None,
                yoy_change_pct: None,
                volume_class: Some(crate::monthly::VolumeClass::VeryLow),
                recovery_trend: None,
            }],
            summary: RunSummary::default(),
        }
    }

    fn tmp_leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| {
                        entry
                            .path()
                            .extension()
                            .is_some_and(|extension| extension == "tmp")
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn publish_writes_all_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = fixture();
        publish(dir.path(), &fixture.artifacts()).expect("publish succeeds");

        for name in [
            TRENDS_FILE,
            IMPACT_FILE,
            SEASONAL_FILE,
            MONTHLY_FILE,
            SUMMARY_FILE,
        ] {
            assert!(dir.path().join(name).exists(), "{name} missing");
        }
        assert_eq!(tmp_leftovers(dir.path()), 0);

        let trends = fs::read_to_string(dir.path().join(TRENDS_FILE)).expect("read trends");
        let mut lines = trends.lines();
        assert_eq!(
            lines.next(),
            Some("group_kind,group_key,date,daily_volume,rolling_7d,rolling_28d")
        );
        assert_eq!(lines.next(), Some("overall,all,2020-01-01,1000,,"));
        // Undefined daily volume renders as an empty field, not 0.
        assert_eq!(lines.next(), Some("overall,all,2020-01-02,,,"));

        let impact = fs::read_to_string(dir.path().join(IMPACT_FILE)).expect("read impact");
        assert!(impact.contains("overall,all,Baseline,1000.0,1000.0,0.0"));

        let monthly = fs::read_to_string(dir.path().join(MONTHLY_FILE)).expect("read monthly");
        assert!(monthly.contains("overall,all,2020,1,winter,1000,1000.0,1000,1,,,very_low,"));
    }

    #[test]
    fn republish_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = fixture();
        let names = [
            TRENDS_FILE,
            IMPACT_FILE,
            SEASONAL_FILE,
            MONTHLY_FILE,
            SUMMARY_FILE,
        ];

        publish(dir.path(), &fixture.artifacts()).expect("first publish");
        let first: BTreeMap<&str, Vec<u8>> = names
            .iter()
            .map(|name| (*name, fs::read(dir.path().join(name)).expect("read artifact")))
            .collect();

        publish(dir.path(), &fixture.artifacts()).expect("second publish");
        for name in names {
            let second = fs::read(dir.path().join(name)).expect("read artifact");
            assert_eq!(first[name], second, "{name} changed between runs");
        }
    }

    #[test]
    fn publish_overwrites_the_previous_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut fixture = fixture();
        publish(dir.path(), &fixture.artifacts()).expect("first publish");

        fixture.trends[0].daily_volume = Some(750.0);
        publish(dir.path(), &fixture.artifacts()).expect("second publish");

        let trends = fs::read_to_string(dir.path().join(TRENDS_FILE)).expect("read trends");
        assert!(trends.contains("overall,all,2020-01-01,750,,"));
        assert!(!trends.contains("overall,all,2020-01-01,1000,,"));
        assert_eq!(tmp_leftovers(dir.path()), 0);
    }

    #[test]
    fn failed_publish_leaves_no_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").expect("write blocker");

        // The output path sits under a regular file, so directory creation
        // must fail before anything is staged.
        let out = blocker.join("processed");
        let fixture = fixture();
        assert!(publish(&out, &fixture.artifacts()).is_err());
        assert!(!out.exists());
    }
}
