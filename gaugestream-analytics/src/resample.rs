//! Downsampling for display and for feeding fixed-size indicator inputs.
//!
//! Two shapes: single-series bucket resampling (pick a stride so the output
//! fits under a point budget) and a multi-series time grid that aligns
//! several symbols onto shared timestamps for comparison overlays.

use itertools::Itertools;

use crate::series::SeriesPoint;

/// How each bucket collapses to one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketReduce {
    #[default]
    Last,
    Average,
    Max,
}

/// Collapse `points` so at most `max_points` remain.
///
/// The stride is `ceil(len / max_points)`, which keeps the bucket count
/// within the budget for every input length; when the input already fits it
/// is returned unchanged. Bucket timestamps come from the last point in the
/// bucket so the series stays aligned with the freshest data.
pub fn bucket_resample(
    points: &[SeriesPoint],
    max_points: usize,
    reduce: BucketReduce,
) -> Vec<SeriesPoint> {
    if max_points == 0 || points.is_empty() {
        return Vec::new();
    }
    if points.len() <= max_points {
        return points.to_vec();
    }

    let stride = points.len().div_ceil(max_points).max(1);
    points
        .iter()
        .chunks(stride)
        .into_iter()
        .map(|bucket| {
            let bucket: Vec<&SeriesPoint> = bucket.collect();
            let last = bucket.last().expect("chunks are non-empty");
            let value = match reduce {
                BucketReduce::Last => last.value,
                BucketReduce::Average => {
                    bucket.iter().map(|p| p.value).sum::<f64>() / bucket.len() as f64
                }
                BucketReduce::Max => bucket
                    .iter()
                    .map(|p| p.value)
                    .fold(f64::NEG_INFINITY, f64::max),
            };
            SeriesPoint::new(last.timestamp, value)
        })
        .collect()
}

/// How gaps inside a grid cell are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapFill {
    /// Hold the last known value.
    #[default]
    Hold,
    /// Linear interpolation between the neighbouring samples.
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Grid step in seconds; `None` picks one automatically.
    pub step_secs: Option<f64>,
    /// Upper bound on grid length when the step is chosen automatically.
    pub max_points: usize,
    pub gap_fill: GapFill,
    /// Shift applied to every series but the first, in grid steps. Positive
    /// values lag the comparison series against the reference.
    pub lag_steps: i64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            step_secs: None,
            max_points: 2_500,
            gap_fill: GapFill::Hold,
            lag_steps: 0,
        }
    }
}

/// One aligned series: values indexed by the shared grid, `None` before the
/// series' first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub values: Vec<Option<f64>>,
}

/// Shared-grid output of [`align_series`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedGrid {
    pub start: f64,
    pub step_secs: f64,
    pub timestamps: Vec<f64>,
    pub series: Vec<AlignedSeries>,
}

const FRIENDLY_STEPS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0,
];

/// Smallest friendly step keeping the grid under `max_points`.
fn auto_step(span_secs: f64, max_points: usize) -> f64 {
    let minimum = span_secs / max_points.max(1) as f64;
    for step in FRIENDLY_STEPS {
        if *step >= minimum {
            return *step;
        }
    }
    // Span too large for the table: fall back to an exact divisor.
    minimum.ceil().max(1.0)
}

/// Resample `inputs` onto one shared time grid.
///
/// The grid spans the union of all input time ranges. Cells before a series'
/// first sample stay `None`; interior gaps fill per `gap_fill`; cells after
/// the last sample hold it. Returns `None` when every input is empty.
pub fn align_series(inputs: &[&[SeriesPoint]], config: &GridConfig) -> Option<AlignedGrid> {
    let start = inputs
        .iter()
        .filter_map(|points| points.first())
        .map(|p| p.timestamp)
        .fold(f64::INFINITY, f64::min);
    let end = inputs
        .iter()
        .filter_map(|points| points.last())
        .map(|p| p.timestamp)
        .fold(f64::NEG_INFINITY, f64::max);
    if !start.is_finite() || !end.is_finite() {
        return None;
    }

    let span = (end - start).max(0.0);
    let step = match config.step_secs {
        Some(step) if step > 0.0 => step,
        _ => auto_step(span, config.max_points),
    };
    let cells = ((span / step).floor() as usize + 1).min(config.max_points.max(1));

    let timestamps: Vec<f64> = (0..cells).map(|i| start + i as f64 * step).collect();

    let series = inputs
        .iter()
        .enumerate()
        .map(|(index, points)| {
            let lag = if index == 0 { 0 } else { config.lag_steps };
            AlignedSeries {
                values: sample_onto_grid(points, &timestamps, step, lag, config.gap_fill),
            }
        })
        .collect();

    Some(AlignedGrid {
        start,
        step_secs: step,
        timestamps,
        series,
    })
}

fn sample_onto_grid(
    points: &[SeriesPoint],
    timestamps: &[f64],
    step: f64,
    lag_steps: i64,
    gap_fill: GapFill,
) -> Vec<Option<f64>> {
    let shift = lag_steps as f64 * step;
    timestamps
        .iter()
        .map(|grid_ts| sample_at(points, grid_ts - shift, gap_fill))
        .collect()
}

/// Value of the series at `ts`: the sample at-or-before it, optionally
/// interpolated toward the next one.
fn sample_at(points: &[SeriesPoint], ts: f64, gap_fill: GapFill) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let after = points.partition_point(|p| p.timestamp <= ts);
    if after == 0 {
        return None;
    }
    let before = &points[after - 1];
    match gap_fill {
        GapFill::Hold => Some(before.value),
        GapFill::Linear => match points.get(after) {
            Some(next) if next.timestamp > before.timestamp => {
                let fraction = (ts - before.timestamp) / (next.timestamp - before.timestamp);
                Some(before.value + fraction * (next.value - before.value))
            }
            _ => Some(before.value),
        },
    }
}
