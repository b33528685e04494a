//! Run configuration: optional TOML file merged with CLI overrides.
//!
//! Precedence per setting: CLI flag, then the TOML file, then the built-in
//! default. Input and output paths have no built-in default and must come
//! from one of the first two.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::periods::{self, Period};

pub const DEFAULT_WINDOWS: [usize; 2] = [7, 28];

/// Raw shape of the TOML file. Everything is optional; resolution fills in
/// defaults and applies overrides.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub rolling: RollingSection,
    #[serde(default, rename = "period")]
    pub periods: Vec<PeriodSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputSection {
    #[serde(default)]
    pub observations: Option<PathBuf>,
    #[serde(default)]
    pub stations: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RollingSection {
    #[serde(default)]
    pub windows: Option<Vec<usize>>,
}

/// One `[[period]]` table. Dates are quoted `YYYY-MM-DD` strings; an absent
/// bound leaves that side of the interval open.
#[derive(Debug, Deserialize)]
pub struct PeriodSpec {
    pub name: String,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl From<PeriodSpec> for Period {
    fn from(spec: PeriodSpec) -> Period {
        Period::new(spec.name, spec.start, spec.end)
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<FileConfig> {
        let raw = fs::read_to_string(path)?;
        let parsed = toml::from_str(&raw)?;
        debug!(file = %path.display(), "loaded configuration file");
        Ok(parsed)
    }
}

/// Settings supplied on the command line. Fields left empty defer to the
/// TOML file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub observations: Option<PathBuf>,
    pub stations: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub windows: Vec<usize>,
}

/// Fully resolved, validated configuration. Built once at startup and passed
/// by reference into every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub observations: PathBuf,
    pub stations: PathBuf,
    pub out_dir: PathBuf,
    pub windows: Vec<usize>,
    pub periods: Vec<Period>,
}

impl PipelineConfig {
    pub fn resolve(file: FileConfig, overrides: CliOverrides) -> Result<PipelineConfig> {
        let observations = overrides
            .observations
            .or(file.input.observations)
            .ok_or_else(|| {
                PipelineError::Config(
                    "no observations path: pass --observations or set [input] observations"
                        .to_string(),
                )
            })?;
        let stations = overrides.stations.or(file.input.stations).ok_or_else(|| {
            PipelineError::Config(
                "no station table path: pass --stations or set [input] stations".to_string(),
            )
        })?;
        let out_dir = overrides.out_dir.or(file.output.directory).ok_or_else(|| {
            PipelineError::Config(
                "no output directory: pass --out or set [output] directory".to_string(),
            )
        })?;

        let windows = if overrides.windows.is_empty() {
            file.rolling
                .windows
                .unwrap_or_else(|| DEFAULT_WINDOWS.to_vec())
        } else {
            overrides.windows
        };
        validate_windows(&windows)?;

        let periods: Vec<Period> = if file.periods.is_empty() {
            periods::default_periods()
        } else {
            file.periods.into_iter().map(Period::from).collect()
        };
        periods::validate(&periods)?;

        Ok(PipelineConfig {
            observations,
            stations,
            out_dir,
            windows,
            periods,
        })
    }
}

fn validate_windows(windows: &[usize]) -> Result<()> {
    if windows.is_empty() {
        return Err(PipelineError::Config(
            "at least one rolling window is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for &window in windows {
        if window == 0 {
            return Err(PipelineError::Config(
                "rolling window of 0 days is not allowed".to_string(),
            ));
        }
        if !seen.insert(window) {
            return Err(PipelineError::Config(format!(
                "duplicate rolling window {window}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periods::BASELINE;

    fn full_overrides() -> CliOverrides {
        CliOverrides {
            observations: Some(PathBuf::from("observations")),
            stations: Some(PathBuf::from("stations.csv")),
            out_dir: Some(PathBuf::from("out")),
            windows: Vec::new(),
        }
    }

    #[test]
    fn defaults_apply_when_file_is_empty() {
        let config = PipelineConfig::resolve(FileConfig::default(), full_overrides())
            .expect("resolvable config");
        assert_eq!(config.windows, vec![7, 28]);
        assert_eq!(config.periods.len(), 3);
        assert_eq!(config.periods[0].name, BASELINE);
    }

    #[test]
    fn cli_windows_win_over_file_windows() {
        let file: FileConfig = toml::from_str(
            r#"
            [rolling]
            windows = [14]
            "#,
        )
        .expect("valid toml");
        let mut overrides = full_overrides();
        overrides.windows = vec![7, 90];

        let config = PipelineConfig::resolve(file, overrides).expect("resolvable config");
        assert_eq!(config.windows, vec![7, 90]);
    }

    #[test]
    fn file_paths_fill_in_missing_cli_paths() {
        let file: FileConfig = toml::from_str(
            r#"
            [input]
            observations = "data/observations"
            stations = "data/stations.csv"

            [output]
            directory = "processed"
            "#,
        )
        .expect("valid toml");

        let config =
            PipelineConfig::resolve(file, CliOverrides::default()).expect("resolvable config");
        assert_eq!(config.observations, PathBuf::from("data/observations"));
        assert_eq!(config.out_dir, PathBuf::from("processed"));
    }

    #[test]
    fn missing_path_is_a_config_error() {
        let mut overrides = full_overrides();
        overrides.stations = None;

        let err = PipelineConfig::resolve(FileConfig::default(), overrides)
            .expect_err("stations path is required");
        match err {
            PipelineError::Config(message) => assert!(message.contains("station")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn custom_periods_come_from_the_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [[period]]
            name = "Baseline"
            end = "2020-03-01"

            [[period]]
            name = "Impact"
            start = "2020-03-01"
            end = "2020-06-01"
            "#,
        )
        .expect("valid toml");

        let config = PipelineConfig::resolve(file, full_overrides()).expect("resolvable config");
        assert_eq!(config.periods.len(), 2);
        assert_eq!(config.periods[0].start, None);
        assert_eq!(
            config.periods[1].end,
            Some(NaiveDate::from_ymd_opt(2020, 6, 1).expect("valid calendar date"))
        );
    }

    #[test]
    fn bad_windows_are_rejected() {
        let mut overrides = full_overrides();
        overrides.windows = vec![7, 7];
        let err = PipelineConfig::resolve(FileConfig::default(), overrides)
            .expect_err("duplicate windows rejected");
        match err {
            PipelineError::Config(message) => assert!(message.contains("duplicate")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut overrides = full_overrides();
        overrides.windows = vec![0];
        assert!(PipelineConfig::resolve(FileConfig::default(), overrides).is_err());
    }

    #[test]
    fn empty_windows_list_from_the_file_is_rejected() {
        // An empty CLI vector means "not provided" and falls back to the
        // file, so the empty list must come from the TOML side.
        let file: FileConfig = toml::from_str(
            r#"
            [rolling]
            windows = []
            "#,
        )
        .expect("valid toml");

        let err = PipelineConfig::resolve(file, full_overrides())
            .expect_err("empty windows list rejected");
        match err {
            PipelineError::Config(message) => assert!(message.contains("at least one")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_file_periods_are_rejected() {
        let file: FileConfig = toml::from_str(
            r#"
            [[period]]
            name = "Baseline"
            end = "2020-06-01"

            [[period]]
            name = "Impact"
            start = "2020-03-01"
            "#,
        )
        .expect("valid toml");

        assert!(PipelineConfig::resolve(file, full_overrides()).is_err());
    }
}
