use crate::alignment::AlignedSeries;

/// Trailing rolling means for one window size, parallel to the group's
/// aligned axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries {
    pub window: usize,
    pub values: Vec<Option<f64>>,
}

/// Mean of the trailing `window` days ending at each axis day. A window
/// that reaches past the start of the axis or contains any gap yields
/// `None`; there is no partial-window averaging.
pub fn rolling_mean(series: &AlignedSeries, window: usize) -> Vec<Option<f64>> {
    let values = series.values();
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut missing = 0usize;
    for idx in 0..values.len() {
        match values[idx] {
            Some(value) => sum += value,
            None => missing += 1,
        }
        if idx >= window {
            match values[idx - window] {
                Some(value) => sum -= value,
                None => missing -= 1,
            }
        }
        if idx + 1 >= window && missing == 0 {
            out[idx] = Some(sum / window as f64);
        }
    }
    out
}

pub fn rolling_for_windows(series: &AlignedSeries, windows: &[usize]) -> Vec<RollingSeries> {
    windows
        .iter()
        .map(|&window| RollingSeries {
            window,
            values: rolling_mean(series, window),
        })
        .collect()
}
