use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Metropolitan region a registration station belongs to. Anything outside
/// the two modeled cities folds to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Oslo,
    Bergen,
    Other,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Oslo => "oslo",
            Region::Bergen => "bergen",
            Region::Other => "other",
        }
    }

    pub fn from_label(value: &str) -> Region {
        match value.trim().to_ascii_lowercase().as_str() {
            "oslo" => Region::Oslo,
            "bergen" => Region::Bergen,
            _ => Region::Other,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Road class of the station's registration point. The acquisition client
/// emits either plain tokens or the Norwegian road-class names, so both are
/// accepted; unknown classes fold to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoadCategory {
    Highway,
    Regional,
    Other,
}

impl RoadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoadCategory::Highway => "highway",
            RoadCategory::Regional => "regional",
            RoadCategory::Other => "other",
        }
    }

    pub fn from_label(value: &str) -> RoadCategory {
        match value.trim().to_ascii_lowercase().as_str() {
            "highway" | "europaveg" | "riksveg" => RoadCategory::Highway,
            "regional" | "fylkesveg" => RoadCategory::Regional,
            _ => RoadCategory::Other,
        }
    }
}

impl fmt::Display for RoadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one registration station. Loaded once per run and
/// never mutated by the pipeline.
#[derive(Debug, Clone)]
pub struct Station {
    pub station_id: String,
    pub name: Option<String>,
    pub region: Region,
    pub road_category: RoadCategory,
}

/// Lookup table over the station metadata CSV.
#[derive(Debug, Default)]
pub struct StationIndex {
    stations: HashMap<String, Station>,
    rows_rejected: usize,
}

impl StationIndex {
    pub fn get(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    /// Region assignment for an observed station; stations missing from the
    /// metadata table are tagged `Other`.
    pub fn region_of(&self, station_id: &str) -> Region {
        self.stations
            .get(station_id)
            .map(|s| s.region)
            .unwrap_or(Region::Other)
    }

    pub fn road_category_of(&self, station_id: &str) -> RoadCategory {
        self.stations
            .get(station_id)
            .map(|s| s.road_category)
            .unwrap_or(RoadCategory::Other)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn rows_rejected(&self) -> usize {
        self.rows_rejected
    }
}

/// Loads the station metadata table. An unreadable or headerless table is
/// fatal; individual malformed rows are rejected with a warning and counted.
pub fn load_station_table(path: &Path) -> Result<StationIndex> {
    let table_error = |message: String| PipelineError::StationTable {
        path: path.display().to_string(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| table_error(err.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|err| table_error(err.to_string()))?
        .clone();

    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let station_col = find("station_id")
        .ok_or_else(|| table_error("missing required column 'station_id'".to_string()))?;
    let region_col = find("region")
        .ok_or_else(|| table_error("missing required column 'region'".to_string()))?;
    let category_col = find("road_category")
        .ok_or_else(|| table_error("missing required column 'road_category'".to_string()))?;
    let name_col = find("name");

    let mut index = StationIndex::default();
    for (row_index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(row = row_index + 1, error = %err, "station row unreadable, rejected");
                index.rows_rejected += 1;
                continue;
            }
        };

        let station_id = record.get(station_col).unwrap_or("").trim();
        if station_id.is_empty() {
            warn!(row = row_index + 1, "station row missing station_id, rejected");
            index.rows_rejected += 1;
            continue;
        }

        let region = Region::from_label(record.get(region_col).unwrap_or(""));
        let road_category = RoadCategory::from_label(record.get(category_col).unwrap_or(""));
        let name = name_col
            .and_then(|col| record.get(col))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        index.stations.insert(
            station_id.to_string(),
            Station {
                station_id: station_id.to_string(),
                name,
                region,
                road_category,
            },
        );
    }

    Ok(index)
}
