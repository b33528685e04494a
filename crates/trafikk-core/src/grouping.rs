use std::collections::BTreeMap;
use std::fmt;

use crate::alignment::AlignedSeries;
use crate::stations::{Region, RoadCategory};

/// Identity of an aggregated series. The derived `Ord` fixes the order in
/// which groups appear in artifacts: overall first, then regions, road
/// categories, and per-station series by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Overall,
    Region(Region),
    RoadCategory(RoadCategory),
    Station(String),
}

impl GroupKey {
    pub fn kind(&self) -> &'static str {
        match self {
            GroupKey::Overall => "overall",
            GroupKey::Region(_) => "region",
            GroupKey::RoadCategory(_) => "road_category",
            GroupKey::Station(_) => "station",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            GroupKey::Overall => "all",
            GroupKey::Region(region) => region.as_str(),
            GroupKey::RoadCategory(category) => category.as_str(),
            GroupKey::Station(station_id) => station_id.as_str(),
        }
    }

    /// Whether this group feeds the comparison artifacts (impact, seasonal,
    /// monthly). Catch-all `Other` groups and per-station series stay in
    /// the trends artifact only.
    pub fn is_metrics_group(&self) -> bool {
        match self {
            GroupKey::Overall => true,
            GroupKey::Region(region) => *region != Region::Other,
            GroupKey::RoadCategory(category) => *category != RoadCategory::Other,
            GroupKey::Station(_) => false,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Overall => f.write_str("overall"),
            other => write!(f, "{}/{}", other.kind(), other.label()),
        }
    }
}

/// Daily network volume per group: for every grouping key, the member
/// station series are summed day by day over the union of their spans. A
/// day where no member reports stays `None`; a day where at least one
/// member reports is the sum of the reporting members.
pub fn aggregate_by<F>(
    station_series: &BTreeMap<String, AlignedSeries>,
    key_for: F,
) -> BTreeMap<GroupKey, AlignedSeries>
where
    F: Fn(&str) -> GroupKey,
{
    let mut members: BTreeMap<GroupKey, Vec<&AlignedSeries>> = BTreeMap::new();
    for (station_id, series) in station_series {
        members.entry(key_for(station_id)).or_default().push(series);
    }

    members
        .into_iter()
        .filter_map(|(key, group)| sum_members(&group).map(|series| (key, series)))
        .collect()
}

fn sum_members(members: &[&AlignedSeries]) -> Option<AlignedSeries> {
    let start = members.iter().map(|s| s.start()).min()?;
    let end = members.iter().map(|s| s.end()).max()?;
    let len = end.signed_duration_since(start).num_days() as usize + 1;

    let mut sums = vec![0.0; len];
    let mut observed = vec![false; len];
    for series in members {
        let offset = series.start().signed_duration_since(start).num_days() as usize;
        for (idx, value) in series.values().iter().enumerate() {
            if let Some(value) = value {
                sums[offset + idx] += value;
                observed[offset + idx] = true;
            }
        }
    }

    let values = sums
        .into_iter()
        .zip(observed)
        .map(|(sum, seen)| seen.then_some(sum))
        .collect();
    AlignedSeries::new(start, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn series(points: &[(&str, f64)]) -> AlignedSeries {
        AlignedSeries::from_sorted_points(points.iter().map(|(d, v)| (date(d), *v)))
            .expect("non-empty series")
    }

    fn stations(entries: Vec<(&str, AlignedSeries)>) -> BTreeMap<String, AlignedSeries> {
        entries
            .into_iter()
            .map(|(id, s)| (id.to_string(), s))
            .collect()
    }

    #[test]
    fn sums_reporting_members_over_union_span() {
        let map = stations(vec![
            (
                "S1",
                series(&[("2020-01-01", 100.0), ("2020-01-02", 110.0), ("2020-01-03", 120.0)]),
            ),
            ("S2", series(&[("2020-01-02", 10.0), ("2020-01-04", 30.0)])),
        ]);

        let groups = aggregate_by(&map, |_| GroupKey::Overall);
        let overall = &groups[&GroupKey::Overall];

        assert_eq!(overall.start(), date("2020-01-01"));
        assert_eq!(overall.end(), date("2020-01-04"));
        assert_eq!(overall.get(date("2020-01-01")), Some(100.0));
        assert_eq!(overall.get(date("2020-01-02")), Some(120.0));
        // S2 has a gap on the 3rd; the sum carries the reporting member.
        assert_eq!(overall.get(date("2020-01-03")), Some(120.0));
        assert_eq!(overall.get(date("2020-01-04")), Some(30.0));
    }

    #[test]
    fn day_with_no_contributors_stays_none() {
        let map = stations(vec![
            ("S1", series(&[("2020-01-01", 5.0), ("2020-01-03", 5.0)])),
            ("S2", series(&[("2020-01-01", 7.0), ("2020-01-03", 7.0)])),
        ]);

        let groups = aggregate_by(&map, |_| GroupKey::Overall);
        let overall = &groups[&GroupKey::Overall];
        assert_eq!(overall.get(date("2020-01-02")), None);
        assert_eq!(overall.get(date("2020-01-03")), Some(12.0));
    }

    #[test]
    fn unknown_members_aggregate_into_other_groups() {
        let map = stations(vec![
            ("S1", series(&[("2020-01-01", 100.0)])),
            ("S2", series(&[("2020-01-01", 50.0)])),
            ("S3", series(&[("2020-01-01", 8.0)])),
        ]);

        let groups = aggregate_by(&map, |id| match id {
            "S1" => GroupKey::Region(Region::Oslo),
            "S2" => GroupKey::Region(Region::Bergen),
            _ => GroupKey::Region(Region::Other),
        });

        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups[&GroupKey::Region(Region::Other)].get(date("2020-01-01")),
            Some(8.0)
        );
    }

    #[test]
    fn region_groups_including_other_sum_to_overall() {
        let map = stations(vec![
            ("S1", series(&[("2020-01-01", 100.0), ("2020-01-02", 90.0)])),
            ("S2", series(&[("2020-01-01", 50.0)])),
            ("S3", series(&[("2020-01-02", 8.0)])),
        ]);

        let overall = aggregate_by(&map, |_| GroupKey::Overall);
        let regions = aggregate_by(&map, |id| match id {
            "S1" => GroupKey::Region(Region::Oslo),
            "S2" => GroupKey::Region(Region::Bergen),
            _ => GroupKey::Region(Region::Other),
        });

        let overall = &overall[&GroupKey::Overall];
        for (day, total) in overall.iter_days() {
            let regional: f64 = regions
                .values()
                .filter_map(|series| series.get(day))
                .sum();
            assert_eq!(total, Some(regional), "conservation failed on {day}");
        }
    }

    #[test]
    fn group_keys_order_overall_regions_categories_stations() {
        let mut keys = vec![
            GroupKey::Station("a".to_string()),
            GroupKey::RoadCategory(RoadCategory::Highway),
            GroupKey::Region(Region::Other),
            GroupKey::Region(Region::Oslo),
            GroupKey::Overall,
            GroupKey::Region(Region::Bergen),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                GroupKey::Overall,
                GroupKey::Region(Region::Oslo),
                GroupKey::Region(Region::Bergen),
                GroupKey::Region(Region::Other),
                GroupKey::RoadCategory(RoadCategory::Highway),
                GroupKey::Station("a".to_string()),
            ]
        );
    }

    #[test]
    fn metrics_groups_exclude_other_and_stations() {
        assert!(GroupKey::Overall.is_metrics_group());
        assert!(GroupKey::Region(Region::Oslo).is_metrics_group());
        assert!(GroupKey::RoadCategory(RoadCategory::Regional).is_metrics_group());
        assert!(!GroupKey::Region(Region::Other).is_metrics_group());
        assert!(!GroupKey::RoadCategory(RoadCategory::Other).is_metrics_group());
        assert!(!GroupKey::Station("S1".to_string()).is_metrics_group());
    }
}
