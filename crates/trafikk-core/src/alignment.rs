use chrono::{Duration, NaiveDate};

use crate::observations::Observation;

/// A continuous daily series: one slot per calendar day from `start`
/// onwards, with missing days held as explicit `None`. The representation
/// makes the no-gaps/no-duplicates guarantee structural, so downstream
/// consumers can index by day offset.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    start: NaiveDate,
    values: Vec<Option<f64>>,
}

impl AlignedSeries {
    /// Returns `None` for an empty value vector; a series always spans at
    /// least one day.
    pub fn new(start: NaiveDate, values: Vec<Option<f64>>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self { start, values })
    }

    /// Builds the aligned axis for one station from its date-sorted,
    /// deduplicated observations.
    pub fn from_observations(observations: &[Observation]) -> Option<Self> {
        Self::from_sorted_points(
            observations
                .iter()
                .map(|obs| (obs.date, f64::from(obs.vehicle_count))),
        )
    }

    /// Builds a series from strictly increasing `(date, value)` points,
    /// filling every uncovered day in between with `None`.
    pub fn from_sorted_points(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Option<Self> {
        let points: Vec<(NaiveDate, f64)> = points.into_iter().collect();
        let (first, _) = *points.first()?;
        let (last, _) = *points.last()?;

        let span = last.signed_duration_since(first).num_days() as usize + 1;
        let mut values = vec![None; span];
        for (date, value) in points {
            let offset = date.signed_duration_since(first).num_days() as usize;
            values[offset] = Some(value);
        }
        Some(Self {
            start: first,
            values,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day covered by the axis (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.date_at(self.values.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.start + Duration::days(index as i64)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = date.signed_duration_since(self.start).num_days();
        if offset < 0 || offset >= self.values.len() as i64 {
            return None;
        }
        Some(offset as usize)
    }

    /// Value on a given day; `None` both for gaps and for days outside the
    /// covered span.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.index_of(date).and_then(|idx| self.values[idx])
    }

    /// Days that carry an observed value.
    pub fn observed_days(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn iter_days(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(idx, value)| (self.date_at(idx), *value))
    }
}
